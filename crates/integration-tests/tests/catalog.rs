//! Integration tests for catalog lookups through the coordinator.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use premium_billing::sandbox::{ListenerEvent, SandboxBillingClient};
use premium_core::{BillingErrorKind, LIFETIME_PERIOD, ProductKind};
use premium_integration_tests::{TestContext, catalog};

async fn ready() -> TestContext {
    let ctx = TestContext::new(SandboxBillingClient::new().with_products(catalog()));
    ctx.helper.initialize().await;
    ctx.recorder.clear();
    ctx
}

fn reported(ctx: &TestContext, kind: BillingErrorKind) -> usize {
    ctx.recorder
        .count(|e| *e == ListenerEvent::BillingError(kind))
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn test_base_plan_with_empty_offer_selects_base_offer() {
    let ctx = ready().await;

    let info = ctx.helper.subscription_price("basic", "").await.unwrap();

    assert_eq!(info.product_id.as_str(), "basic");
    assert_eq!(info.base_plan_id.as_deref(), Some("basic"));
    assert_eq!(info.offer_id, None);
    assert_eq!(info.formatted_price, "$4.99");
    assert_eq!(
        ctx.helper.offer_token("basic", "").await.as_deref(),
        Some("tok-basic-base")
    );
}

#[tokio::test]
async fn test_named_offer_is_selected() {
    let ctx = ready().await;

    let info = ctx.helper.subscription_price("basic", "trial").await.unwrap();

    assert_eq!(info.offer_id.as_deref(), Some("trial"));
    assert_eq!(info.formatted_price, "Free");
}

#[tokio::test]
async fn test_missing_product_reports_product_not_exist() {
    let ctx = ready().await;

    assert!(ctx.helper.product_detail("gold", ProductKind::OneTime).await.is_none());
    assert!(ctx.helper.subscription_price("gold", "").await.is_none());
    assert!(ctx.helper.one_time_price("gold").await.is_none());

    assert_eq!(reported(&ctx, BillingErrorKind::ProductNotExist), 3);
}

#[tokio::test]
async fn test_missing_offer_reports_offer_not_exist() {
    let ctx = ready().await;

    assert!(ctx.helper.subscription_price("monthly", "winback").await.is_none());

    assert_eq!(reported(&ctx, BillingErrorKind::OfferNotExist), 1);
    assert_eq!(reported(&ctx, BillingErrorKind::ProductNotExist), 0);
}

#[tokio::test]
async fn test_product_detail_respects_kind() {
    let ctx = ready().await;

    let premium = ctx
        .helper
        .product_detail("yearly", ProductKind::Subscription)
        .await
        .unwrap();
    assert_eq!(premium.product_id.as_str(), "premium");
    assert!(
        ctx.helper
            .product_detail("premium", ProductKind::OneTime)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_one_time_price_uses_lifetime_period() {
    let ctx = ready().await;

    let info = ctx.helper.one_time_price("remove_ads").await.unwrap();

    assert_eq!(info.kind, ProductKind::OneTime);
    assert_eq!(info.billing_period, LIFETIME_PERIOD);
    assert_eq!(info.formatted_price, "$2.99");
}

#[tokio::test]
async fn test_all_prices_follow_fetch_order() {
    let ctx = ready().await;

    let prices = ctx.helper.all_product_prices().await;

    assert_eq!(prices.len(), 6);
    let subscriptions = prices
        .iter()
        .take_while(|p| p.kind == ProductKind::Subscription)
        .count();
    assert_eq!(subscriptions, 4);
}

// =============================================================================
// Purchase flow guards
// =============================================================================

#[tokio::test]
async fn test_buy_one_time_rejects_subscription_id() {
    let ctx = ready().await;

    assert_eq!(
        ctx.helper.buy_one_time("premium", false).await,
        Err(BillingErrorKind::InvalidProductTypeSet)
    );
    assert_eq!(reported(&ctx, BillingErrorKind::InvalidProductTypeSet), 1);
}

#[tokio::test]
async fn test_subscribe_unknown_offer_does_not_launch() {
    let ctx = ready().await;

    assert_eq!(
        ctx.helper.subscribe("yearly", "intro").await,
        Err(BillingErrorKind::OfferNotExist)
    );
    assert_eq!(
        ctx.client.count_calls(|c| matches!(
            c,
            premium_billing::sandbox::Call::LaunchBillingFlow(_)
        )),
        0
    );
}

#[tokio::test]
async fn test_guards_before_initialize() {
    let ctx = TestContext::new(SandboxBillingClient::new().with_products(catalog()));

    assert_eq!(
        ctx.helper.subscribe("basic", "").await,
        Err(BillingErrorKind::ClientDisconnected)
    );
    assert_eq!(
        ctx.helper.fetch_active_purchases().await,
        Err(BillingErrorKind::ClientDisconnected)
    );
    assert!(!ctx.helper.are_subscriptions_supported().await);
    assert_eq!(reported(&ctx, BillingErrorKind::BillingUnavailable), 1);
}
