//! Integration tests for connection lifecycle and readiness.
//!
//! Covers initialize, repeated initialize, setup failure, slow initial
//! fetches, service disconnects and reconnects.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use premium_billing::sandbox::{Call, ListenerEvent, Operation, SandboxBillingClient};
use premium_billing::{ConnectionState, InitOutcome, Readiness};
use premium_core::{
    BillingErrorKind, Feature, ProductKind, Purchase, PurchaseState, ResponseCode,
};
use premium_integration_tests::{EVENT_WAIT, TestContext, catalog, default_config};

fn sandbox() -> SandboxBillingClient {
    SandboxBillingClient::new().with_products(catalog())
}

/// Poll until at least `n` events match, or give up after [`EVENT_WAIT`].
async fn wait_for_count(
    ctx: &TestContext,
    n: usize,
    predicate: impl Fn(&ListenerEvent) -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + EVENT_WAIT;
    while tokio::time::Instant::now() < deadline {
        if ctx.recorder.count(&predicate) >= n {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// =============================================================================
// Initialize
// =============================================================================

#[tokio::test]
async fn test_initialize_signals_ready_once_fetches_complete() {
    let ctx = TestContext::new(sandbox());

    let outcome = ctx.helper.initialize().await;

    assert_eq!(outcome, InitOutcome::Ready(Readiness::Complete));
    assert_eq!(ctx.helper.connection_state().await, ConnectionState::Ready);
    assert!(ctx.helper.is_client_ready().await);
    assert_eq!(ctx.helper.products().await.len(), 4);
    assert_eq!(
        ctx.recorder
            .count(|e| *e == ListenerEvent::ClientReady(Readiness::Complete)),
        1
    );
}

#[tokio::test]
async fn test_initialize_queries_both_kinds_with_configured_keys() {
    let ctx = TestContext::new(sandbox());
    ctx.helper.initialize().await;

    let calls = ctx.client.calls();
    assert_eq!(calls[0], Call::StartConnection);
    assert_eq!(
        ctx.client.count_calls(|c| matches!(
            c,
            Call::QueryProductDetails(ProductKind::Subscription, ids) if ids.len() == 2
        )),
        1
    );
    assert_eq!(
        ctx.client.count_calls(|c| matches!(
            c,
            Call::QueryProductDetails(ProductKind::OneTime, ids) if ids.len() == 2
        )),
        1
    );
    assert_eq!(
        ctx.client
            .count_calls(|c| matches!(c, Call::QueryPurchases(_))),
        2
    );
}

#[tokio::test]
async fn test_second_initialize_reports_already_connected() {
    let ctx = TestContext::new(sandbox());
    ctx.helper.initialize().await;

    let outcome = ctx.helper.initialize().await;

    assert_eq!(outcome, InitOutcome::AlreadyConnected);
    assert_eq!(
        ctx.recorder
            .count(|e| *e == ListenerEvent::ClientAlreadyConnected),
        1
    );
    assert_eq!(
        ctx.client.count_calls(|c| *c == Call::StartConnection),
        1
    );
}

#[tokio::test]
async fn test_setup_failure_reports_init_error_and_allows_retry() {
    let ctx = TestContext::new(sandbox());
    ctx.client
        .fail(Operation::Connect, ResponseCode::BillingUnavailable);

    let outcome = ctx.helper.initialize().await;

    assert!(matches!(outcome, InitOutcome::Failed(ref r) if r.code == ResponseCode::BillingUnavailable));
    assert_eq!(
        ctx.helper.connection_state().await,
        ConnectionState::Disconnected
    );
    assert_eq!(
        ctx.recorder.count(|e| *e
            == ListenerEvent::ClientInitError(ResponseCode::BillingUnavailable)),
        1
    );

    ctx.client.recover(Operation::Connect);
    assert_eq!(
        ctx.helper.initialize().await,
        InitOutcome::Ready(Readiness::Complete)
    );
}

#[tokio::test]
async fn test_failed_subscription_fetch_still_signals_ready() {
    let ctx = TestContext::new(sandbox());
    ctx.client.fail(
        Operation::QuerySubscriptionProducts,
        ResponseCode::ServiceUnavailable,
    );

    let outcome = ctx.helper.initialize().await;

    assert_eq!(outcome, InitOutcome::Ready(Readiness::Complete));
    assert!(ctx.helper.one_time_price("remove_ads").await.is_some());
    assert!(ctx.helper.subscription_price("basic", "").await.is_none());
}

// =============================================================================
// Slow initial fetches
// =============================================================================

#[tokio::test]
async fn test_hung_product_query_yields_degraded_then_late_update() {
    let ctx = TestContext::new(sandbox());
    ctx.client.hang_product_query(ProductKind::Subscription);

    let outcome = ctx.helper.initialize().await;
    assert_eq!(outcome, InitOutcome::Ready(Readiness::Degraded));
    assert!(ctx.helper.subscription_price("basic", "").await.is_none());

    // The empty purchase query already produced one update.
    let before = ctx
        .recorder
        .count(|e| *e == ListenerEvent::PurchasesUpdated);

    ctx.client.release_hung_queries();

    assert!(wait_for_count(&ctx, before + 1, |e| *e == ListenerEvent::PurchasesUpdated).await);
    assert!(ctx.helper.subscription_price("basic", "").await.is_some());
}

// =============================================================================
// Disconnect and reconnect
// =============================================================================

#[tokio::test]
async fn test_disconnect_reports_service_disconnected() {
    let ctx = TestContext::new(sandbox());
    ctx.helper.initialize().await;

    assert!(ctx.client.disconnect());

    assert!(
        ctx.recorder
            .wait_for(
                |e| *e == ListenerEvent::ClientInitError(ResponseCode::ServiceDisconnected),
                EVENT_WAIT
            )
            .await
    );
    assert_eq!(
        ctx.helper.connection_state().await,
        ConnectionState::Disconnected
    );
    assert_eq!(
        ctx.helper.subscribe("basic", "").await,
        Err(BillingErrorKind::ServiceDisconnected)
    );
}

#[tokio::test]
async fn test_reconnect_refetches_and_signals_ready_again() {
    let ctx = TestContext::new(sandbox());
    ctx.helper.initialize().await;
    ctx.client.disconnect();
    ctx.client.reconnect();

    assert!(
        wait_for_count(&ctx, 2, |e| matches!(e, ListenerEvent::ClientReady(_))).await
    );
    assert_eq!(ctx.helper.connection_state().await, ConnectionState::Ready);
    // Re-fetched entries are appended; duplicates are kept.
    assert_eq!(ctx.helper.products().await.len(), 8);
    assert_eq!(
        ctx.helper.subscription_price("premium", "").await,
        None,
        "premium is a product id, not a base plan"
    );
    assert!(ctx.helper.subscription_price("monthly", "").await.is_some());
}

#[tokio::test]
async fn test_release_keeps_cached_data() {
    let ctx = TestContext::new(sandbox());
    ctx.helper.initialize().await;

    ctx.helper.release().await;

    assert_eq!(
        ctx.helper.connection_state().await,
        ConnectionState::Disconnected
    );
    assert!(!ctx.helper.is_client_ready().await);
    assert_eq!(ctx.helper.all_product_prices().await.len(), 6);
    assert_eq!(
        ctx.helper.buy_one_time("remove_ads", false).await,
        Err(BillingErrorKind::ClientDisconnected)
    );
}

#[tokio::test]
async fn test_subscriptions_support_follows_feature_flag() {
    let ctx = TestContext::new(sandbox());
    ctx.helper.initialize().await;
    assert!(ctx.helper.are_subscriptions_supported().await);

    ctx.client.set_feature_supported(Feature::Subscriptions, false);
    assert!(!ctx.helper.are_subscriptions_supported().await);
}

#[tokio::test]
async fn test_purchase_push_handled_while_reconnect_refresh_hangs() {
    let config = default_config().with_ready_timeout(Duration::from_secs(3));
    let ctx = TestContext::with_config(config, sandbox());
    ctx.helper.initialize().await;
    ctx.client.disconnect();
    ctx.client.hang_product_query(ProductKind::Subscription);
    ctx.client.reconnect();

    let started = tokio::time::Instant::now();
    assert!(ctx.client.push_purchases(vec![Purchase::new(
        "tok-ads",
        "remove_ads",
        PurchaseState::Purchased,
    )]));

    assert!(
        ctx.recorder
            .wait_for(
                |e| *e == ListenerEvent::PurchaseAcknowledged("tok-ads".into()),
                EVENT_WAIT
            )
            .await
    );
    assert!(started.elapsed() < Duration::from_millis(500));

    // A second disconnect is not held back by the pending refresh either.
    assert!(ctx.client.disconnect());
    assert!(
        wait_for_count(&ctx, 2, |e| *e
            == ListenerEvent::ClientInitError(ResponseCode::ServiceDisconnected))
        .await
    );
    ctx.client.release_hung_queries();
}

#[tokio::test]
async fn test_release_stops_late_initial_fetches() {
    let ctx = TestContext::new(sandbox());
    ctx.client.hang_product_query(ProductKind::Subscription);
    assert_eq!(
        ctx.helper.initialize().await,
        InitOutcome::Ready(Readiness::Degraded)
    );
    let updates = ctx
        .recorder
        .count(|e| *e == ListenerEvent::PurchasesUpdated);
    let products = ctx.helper.products().await.len();

    ctx.helper.release().await;
    ctx.client.release_hung_queries();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        ctx.recorder
            .count(|e| *e == ListenerEvent::PurchasesUpdated),
        updates
    );
    assert_eq!(ctx.helper.products().await.len(), products);
}
