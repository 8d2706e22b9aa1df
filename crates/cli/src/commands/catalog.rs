//! Read-only commands: prices, status, management link.

use std::path::Path;

use premium_billing::PremiumHelper;
use premium_core::{ProductId, ProductKind};
use tracing::info;

use super::session;

/// Log every price the catalog offers.
///
/// # Errors
///
/// Returns an error if the session cannot be opened.
pub async fn prices(scenario: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open(scenario).await?;
    let prices = session.helper.all_product_prices().await;

    info!("Catalog prices");
    info!("==============");
    for price in &prices {
        let plan = match (&price.base_plan_id, &price.offer_id) {
            (Some(plan), Some(offer)) => format!(" [{plan}/{offer}]"),
            (Some(plan), None) => format!(" [{plan}]"),
            _ => String::new(),
        };
        info!(
            "  {} ({}){plan}: {} / {}",
            price.product_id, price.kind, price.formatted_price, price.billing_period
        );
    }
    info!("Total: {}", prices.len());

    info!("Subscription schedules");
    for product in session.helper.products().await {
        for offer in &product.subscription_offers {
            info!(
                "  {} [{}/{}]",
                product.product_id,
                offer.base_plan_id,
                offer.offer_id.as_deref().unwrap_or("-")
            );
            for phase in &offer.pricing_phases {
                let amount = if phase.price.is_free() {
                    "free".to_string()
                } else {
                    format!("{} {}", phase.price.amount(), phase.price.currency_code)
                };
                info!(
                    "    {} x{}: {amount} ({:?})",
                    phase.billing_period, phase.billing_cycle_count, phase.recurrence_mode
                );
            }
        }
    }

    session.helper.release().await;
    Ok(())
}

/// Log connection state and entitlements after the initial reconciliation.
///
/// # Errors
///
/// Returns an error if the session cannot be opened.
pub async fn status(scenario: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open(scenario).await?;
    let helper = &session.helper;

    info!("Connection: {}", helper.connection_state().await);
    info!("Subscriptions supported: {}", helper.are_subscriptions_supported().await);
    info!(
        "Active subscription: {}",
        helper.has_any_active_subscription().await
    );
    for purchase in helper.active_purchases(ProductKind::Subscription).await {
        info!(
            "  subs {} ({})",
            purchase.purchase_token,
            purchase
                .primary_product()
                .map_or("-", ProductId::as_str)
        );
    }
    info!(
        "Active one-time purchase: {}",
        helper.has_active_one_time_purchase().await
    );
    for purchase in helper.active_purchases(ProductKind::OneTime).await {
        info!(
            "  inapp {} ({})",
            purchase.purchase_token,
            purchase
                .primary_product()
                .map_or("-", ProductId::as_str)
        );
    }

    for event in session.recorder.events() {
        info!(?event, "Listener event");
    }

    helper.release().await;
    Ok(())
}

/// Log the subscription management link.
///
/// # Errors
///
/// Returns an error if the product id is invalid.
pub fn manage_url(package: &str, product: &str) -> Result<(), Box<dyn std::error::Error>> {
    let product_id = ProductId::parse(product)?;
    let url = PremiumHelper::subscription_management_url(package, &product_id)?;
    info!("{url}");
    Ok(())
}
