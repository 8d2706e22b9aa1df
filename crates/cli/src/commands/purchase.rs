//! Purchase commands: buy a one-time product or subscribe.

use std::path::Path;
use std::time::Duration;

use premium_billing::sandbox::ListenerEvent;
use tracing::{info, warn};

use super::session::{self, Session};

/// How long to wait for the sandbox to push the purchase result.
const PURCHASE_WAIT: Duration = Duration::from_secs(5);

/// Buy a one-time product and wait for reconciliation.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the flow is rejected.
pub async fn buy(
    scenario: &Path,
    product: &str,
    personalized: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open(scenario).await?;
    session.recorder.clear();

    info!(product, personalized, "Launching one-time purchase");
    session.helper.buy_one_time(product, personalized).await?;
    finish(&session).await;
    Ok(())
}

/// Subscribe to a base plan and wait for reconciliation.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the flow is rejected.
pub async fn subscribe(
    scenario: &Path,
    base_plan: &str,
    offer: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open(scenario).await?;
    session.recorder.clear();

    info!(base_plan, offer, "Launching subscription purchase");
    session.helper.subscribe(base_plan, offer).await?;
    finish(&session).await;
    Ok(())
}

async fn finish(session: &Session) {
    let settled = session
        .recorder
        .wait_for(
            |event| {
                matches!(
                    event,
                    ListenerEvent::ProductsPurchased(_) | ListenerEvent::BillingError(_)
                )
            },
            PURCHASE_WAIT,
        )
        .await;
    if !settled {
        warn!("No purchase result within {}s", PURCHASE_WAIT.as_secs());
    }

    for event in session.recorder.events() {
        info!(?event, "Listener event");
    }
    info!(
        acknowledged = session.client.acknowledged_tokens().len(),
        consumed = session.client.consumed_tokens().len(),
        "Sandbox totals"
    );
    session.helper.release().await;
}
