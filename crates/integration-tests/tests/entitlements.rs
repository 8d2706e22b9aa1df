//! Integration tests for entitlement checks and subscription replacement.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use premium_billing::sandbox::{Call, ListenerEvent, SandboxBillingClient};
use premium_core::{
    BillingErrorKind, ProductKind, Purchase, PurchaseState, PurchaseToken, ReplacementMode,
};
use premium_integration_tests::{EVENT_WAIT, TestContext, catalog};

fn acknowledged(token: &str, product: &str) -> Purchase {
    let mut purchase = Purchase::new(token, product, PurchaseState::Purchased);
    purchase.acknowledged = true;
    purchase
}

async fn owning(owned: Vec<(ProductKind, Purchase)>) -> TestContext {
    let client = owned
        .into_iter()
        .fold(SandboxBillingClient::new().with_products(catalog()), |client, (kind, p)| {
            client.with_owned(kind, p)
        });
    let ctx = TestContext::new(client);
    ctx.helper.initialize().await;
    ctx
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_empty_ledger_grants_nothing() {
    let ctx = owning(vec![]).await;

    assert!(!ctx.helper.has_any_active_subscription().await);
    assert!(!ctx.helper.has_active_one_time_purchase().await);
    assert!(!ctx.helper.has_active_subscription_for_product("basic").await);
    assert!(!ctx.helper.has_active_subscription_for_base_plan("basic").await);
    assert_eq!(
        ctx.recorder.count(|e| *e
            == ListenerEvent::BillingError(BillingErrorKind::ProductNotExist)),
        1
    );
}

#[tokio::test]
async fn test_subscription_is_found_by_product_and_base_plan() {
    let ctx = owning(vec![(
        ProductKind::Subscription,
        acknowledged("tok-premium", "premium"),
    )])
    .await;

    assert!(ctx.helper.has_any_active_subscription().await);
    assert!(ctx.helper.has_active_subscription_for_product("premium").await);
    assert!(ctx.helper.has_active_subscription_for_base_plan("monthly").await);
    assert!(ctx.helper.has_active_subscription_for_base_plan("yearly").await);
    assert!(!ctx.helper.has_active_subscription_for_base_plan("basic").await);
    assert!(!ctx.helper.has_active_one_time_purchase().await);
}

#[tokio::test]
async fn test_one_time_entitlement_by_product() {
    let ctx = owning(vec![(
        ProductKind::OneTime,
        acknowledged("tok-ads", "remove_ads"),
    )])
    .await;

    assert!(ctx.helper.has_active_one_time_purchase().await);
    assert!(
        ctx.helper
            .has_active_one_time_purchase_for_product("remove_ads")
            .await
    );
    assert!(
        !ctx.helper
            .has_active_one_time_purchase_for_product("coins_100")
            .await
    );
    assert!(!ctx.helper.has_any_active_subscription().await);
}

// =============================================================================
// Replacement
// =============================================================================

#[tokio::test]
async fn test_upgrade_passes_old_token_and_replaces_ownership() {
    let ctx = owning(vec![(
        ProductKind::Subscription,
        acknowledged("tok-basic", "basic"),
    )])
    .await;
    ctx.recorder.clear();

    ctx.helper
        .upgrade_or_downgrade_subscription(
            "yearly",
            "",
            "basic",
            ReplacementMode::ChargeProratedPrice,
        )
        .await
        .unwrap();

    let launched = ctx
        .client
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::LaunchBillingFlow(params) => Some(params),
            _ => None,
        })
        .unwrap();
    let update = launched.subscription_update.unwrap();
    assert_eq!(update.old_purchase_token, PurchaseToken::from("tok-basic"));
    assert_eq!(update.replacement_mode, ReplacementMode::ChargeProratedPrice);
    assert_eq!(launched.product_id.as_str(), "premium");
    assert_eq!(launched.offer_token.as_deref(), Some("tok-yearly-base"));

    assert!(
        ctx.recorder
            .wait_for(|e| matches!(e, ListenerEvent::ProductsPurchased(_)), EVENT_WAIT)
            .await
    );
    let owned = ctx.client.owned();
    assert_eq!(owned.len(), 1);
    assert!(owned[0].covers("premium"));
    assert!(ctx.helper.has_active_subscription_for_product("premium").await);
}

#[tokio::test]
async fn test_upgrade_without_held_plan_reports_missing_token() {
    let ctx = owning(vec![]).await;

    assert_eq!(
        ctx.helper
            .upgrade_or_downgrade_subscription("yearly", "", "basic", ReplacementMode::default())
            .await,
        Err(BillingErrorKind::OldPurchaseTokenNotFound)
    );
    assert_eq!(
        ctx.client
            .count_calls(|c| matches!(c, Call::LaunchBillingFlow(_))),
        0
    );
}
