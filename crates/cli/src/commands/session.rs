//! Open a coordinator session against a sandbox scenario.

use std::path::Path;
use std::sync::Arc;

use premium_billing::sandbox::{RecordingListener, SandboxBillingClient, SandboxScenario};
use premium_billing::{BillingConfig, InitOutcome, PremiumHelper};
use tracing::info;

/// A connected coordinator plus the sandbox and recorder behind it.
pub struct Session {
    pub helper: PremiumHelper,
    pub client: Arc<SandboxBillingClient>,
    pub recorder: Arc<RecordingListener>,
}

/// Load `scenario_path`, build a coordinator and initialize it.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded, the configuration is
/// invalid, or billing setup fails.
pub async fn open(scenario_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    info!(path = %scenario_path.display(), "Loading sandbox scenario");
    let scenario = SandboxScenario::from_path(scenario_path).await?;

    let config = if scenario.has_keys() {
        scenario.billing_config()
    } else {
        info!("Scenario lists no product keys; reading PREMIUM_* environment");
        BillingConfig::from_env()?
    };

    let client = Arc::new(scenario.into_client());
    let recorder = Arc::new(RecordingListener::new());
    let helper = PremiumHelper::builder(config, client.clone())
        .client_listener(recorder.clone())
        .event_listener(recorder.clone())
        .build()?;

    match helper.initialize().await {
        InitOutcome::Ready(readiness) => info!(?readiness, "Billing client ready"),
        InitOutcome::AlreadyConnected => {}
        InitOutcome::Failed(response) => return Err(response.into()),
    }

    Ok(Session {
        helper,
        client,
        recorder,
    })
}
