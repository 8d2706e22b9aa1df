//! Purchase reconciliation.
//!
//! Each raw purchase record from the billing service goes through:
//!
//! 1. State gate: cancelled records are skipped, pending records raise a
//!    single `ACKNOWLEDGE_WARNING`.
//! 2. Kind resolution: catalog first, then the configured key lists.
//! 3. Acknowledgment (or direct recording when already acknowledged).
//! 4. Consumption for configured consumables, regardless of step 3.
//!
//! Ledger writes take the coordinator's write lock briefly; listeners are
//! called after the lock is released.

use premium_core::{BillingErrorKind, ProductId, ProductKind, Purchase, PurchaseState};
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use crate::client::BillingClient;
use crate::config::BillingConfig;
use crate::listener::Listeners;
use crate::state::BillingState;

/// Tally of what a reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records that were cancelled or had no product id.
    pub skipped: usize,
    /// Pending records; one warning was emitted for each.
    pub pending: usize,
    /// Ledger insertions.
    pub recorded: usize,
    pub acknowledged: usize,
    pub acknowledge_failures: usize,
    pub consumed: usize,
    pub consume_failures: usize,
    /// Purchased records whose product kind could not be resolved.
    pub unknown_kind: usize,
}

impl ReconcileReport {
    fn merge(&mut self, other: &Self) {
        self.skipped += other.skipped;
        self.pending += other.pending;
        self.recorded += other.recorded;
        self.acknowledged += other.acknowledged;
        self.acknowledge_failures += other.acknowledge_failures;
        self.consumed += other.consumed;
        self.consume_failures += other.consume_failures;
        self.unknown_kind += other.unknown_kind;
    }
}

/// Runs purchase records through the pipeline against shared state.
pub(crate) struct Reconciler<'a> {
    pub(crate) client: &'a dyn BillingClient,
    pub(crate) config: &'a BillingConfig,
    pub(crate) state: &'a RwLock<BillingState>,
    pub(crate) listeners: &'a Listeners,
}

impl Reconciler<'_> {
    /// Reconcile a batch, one record at a time in order.
    pub(crate) async fn reconcile(&self, purchases: &[Purchase]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for purchase in purchases {
            report.merge(&self.reconcile_one(purchase).await);
        }
        premium_log!(
            self.config.logging,
            records = purchases.len(),
            recorded = report.recorded,
            pending = report.pending,
            "Reconciled purchase batch"
        );
        report
    }

    #[instrument(skip_all, fields(token = %purchase.purchase_token))]
    async fn reconcile_one(&self, purchase: &Purchase) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        match purchase.state {
            PurchaseState::Purchased => {}
            PurchaseState::Pending => {
                premium_log!(self.config.logging, "Purchase is pending; not acknowledging yet");
                self.listeners
                    .events
                    .on_billing_error(BillingErrorKind::AcknowledgeWarning);
                report.pending = 1;
                return report;
            }
            PurchaseState::Cancelled => {
                report.skipped = 1;
                return report;
            }
        }

        let Some(product_id) = purchase.primary_product() else {
            warn!("Purchase has no product id; skipping");
            report.skipped = 1;
            return report;
        };

        let kind = self.resolve_kind(product_id).await;
        if kind.is_none() {
            warn!(product_id = %product_id, "Unknown product kind; purchase will not be recorded");
            report.unknown_kind = 1;
        }

        if purchase.acknowledged {
            if let Some(kind) = kind {
                self.state.write().await.ledger.record(kind, purchase.clone());
                report.recorded = 1;
                self.listeners.client.on_purchases_updated();
            }
        } else {
            self.acknowledge(purchase, kind, &mut report).await;
        }

        if self.config.is_consumable(product_id) {
            self.consume(purchase, &mut report).await;
        }

        report
    }

    async fn resolve_kind(&self, product_id: &ProductId) -> Option<ProductKind> {
        let from_catalog = self
            .state
            .read()
            .await
            .catalog
            .product_kind_of(product_id.as_str());
        from_catalog.or_else(|| self.config.configured_kind(product_id))
    }

    async fn acknowledge(
        &self,
        purchase: &Purchase,
        kind: Option<ProductKind>,
        report: &mut ReconcileReport,
    ) {
        if let Err(response) = self
            .client
            .acknowledge_purchase(&purchase.purchase_token)
            .await
        {
            warn!(error = %response, "Failed to acknowledge purchase");
            self.listeners
                .events
                .on_billing_error(BillingErrorKind::AcknowledgeError);
            report.acknowledge_failures = 1;
            return;
        }

        let mut acknowledged = purchase.clone();
        if let Err(e) = acknowledged.acknowledge() {
            warn!(error = %e, "Acknowledged purchase is not in the purchased state");
        }
        report.acknowledged = 1;
        premium_log!(self.config.logging, "Purchase acknowledged");

        if let Some(kind) = kind {
            self.state
                .write()
                .await
                .ledger
                .record(kind, acknowledged.clone());
            report.recorded = 1;
            self.listeners.client.on_purchases_updated();
        }
        self.listeners.events.on_purchase_acknowledged(&acknowledged);
    }

    async fn consume(&self, purchase: &Purchase, report: &mut ReconcileReport) {
        match self.client.consume_purchase(&purchase.purchase_token).await {
            Ok(()) => {
                let removed = self
                    .state
                    .write()
                    .await
                    .ledger
                    .remove_consumed(&purchase.purchase_token);
                premium_log!(self.config.logging, removed, "Purchase consumed");
                report.consumed = 1;
                self.listeners.events.on_purchase_consumed(purchase);
            }
            Err(response) => {
                warn!(error = %response, "Failed to consume purchase");
                self.listeners
                    .events
                    .on_billing_error(BillingErrorKind::ConsumeError);
                report.consume_failures = 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use premium_core::{OneTimeOffer, Price, Product, PurchaseToken, ResponseCode};

    use super::*;
    use crate::sandbox::{ListenerEvent, Operation, RecordingListener, SandboxBillingClient};

    struct Harness {
        client: SandboxBillingClient,
        config: BillingConfig,
        state: RwLock<BillingState>,
        listeners: Listeners,
        recorder: Arc<RecordingListener>,
    }

    impl Harness {
        fn new() -> Self {
            let recorder = Arc::new(RecordingListener::new());
            Self {
                client: SandboxBillingClient::new(),
                config: BillingConfig::default()
                    .with_subscription_keys(["basic"])
                    .with_one_time_keys(["coins_100", "remove_ads"])
                    .with_consumable_keys(["coins_100"]),
                state: RwLock::new(BillingState::default()),
                listeners: Listeners {
                    client: recorder.clone(),
                    events: recorder.clone(),
                },
                recorder,
            }
        }

        async fn reconcile(&self, purchases: &[Purchase]) -> ReconcileReport {
            Reconciler {
                client: &self.client,
                config: &self.config,
                state: &self.state,
                listeners: &self.listeners,
            }
            .reconcile(purchases)
            .await
        }

        async fn ledger_len(&self, kind: ProductKind) -> usize {
            self.state.read().await.ledger.bucket(kind).len()
        }
    }

    fn purchased(token: &str, product: &str) -> Purchase {
        Purchase::new(token, product, PurchaseState::Purchased)
    }

    #[tokio::test]
    async fn test_pending_warns_once_and_leaves_ledger_alone() {
        let harness = Harness::new();
        let report = harness
            .reconcile(&[Purchase::new("tok-1", "basic", PurchaseState::Pending)])
            .await;

        assert_eq!(report.pending, 1);
        assert_eq!(harness.state.read().await.ledger.len(), 0);
        assert_eq!(
            harness
                .recorder
                .count(|e| *e == ListenerEvent::BillingError(BillingErrorKind::AcknowledgeWarning)),
            1
        );
        assert!(harness.client.acknowledged_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_is_silent() {
        let harness = Harness::new();
        let report = harness
            .reconcile(&[Purchase::new("tok-1", "basic", PurchaseState::Cancelled)])
            .await;

        assert_eq!(report.skipped, 1);
        assert_eq!(harness.state.read().await.ledger.len(), 0);
        assert!(harness.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_success_records_once_and_notifies_once() {
        let harness = Harness::new();
        let report = harness.reconcile(&[purchased("tok-1", "basic")]).await;

        assert_eq!(report.acknowledged, 1);
        assert_eq!(report.recorded, 1);
        assert_eq!(harness.ledger_len(ProductKind::Subscription).await, 1);
        assert_eq!(
            harness.client.acknowledged_tokens(),
            vec![PurchaseToken::new("tok-1")]
        );
        assert_eq!(
            harness
                .recorder
                .count(|e| matches!(e, ListenerEvent::PurchaseAcknowledged(_))),
            1
        );
        assert_eq!(
            harness.recorder.count(|e| *e == ListenerEvent::PurchasesUpdated),
            1
        );
        let state = harness.state.read().await;
        assert!(state.ledger.bucket(ProductKind::Subscription)[0].acknowledged);
    }

    #[tokio::test]
    async fn test_acknowledge_failure_reports_and_does_not_record() {
        let harness = Harness::new();
        harness
            .client
            .fail(Operation::Acknowledge, ResponseCode::ServiceUnavailable);
        let report = harness.reconcile(&[purchased("tok-1", "basic")]).await;

        assert_eq!(report.acknowledge_failures, 1);
        assert_eq!(harness.state.read().await.ledger.len(), 0);
        assert!(harness
            .recorder
            .events()
            .contains(&ListenerEvent::BillingError(BillingErrorKind::AcknowledgeError)));
        // No retry.
        assert_eq!(harness.client.acknowledge_attempts(), 1);
    }

    #[tokio::test]
    async fn test_already_acknowledged_is_recorded_directly() {
        let harness = Harness::new();
        let mut purchase = purchased("tok-1", "remove_ads");
        purchase.acknowledged = true;
        let report = harness.reconcile(&[purchase]).await;

        assert_eq!(report.recorded, 1);
        assert_eq!(report.acknowledged, 0);
        assert_eq!(harness.client.acknowledge_attempts(), 0);
        assert_eq!(harness.ledger_len(ProductKind::OneTime).await, 1);
    }

    #[tokio::test]
    async fn test_consume_runs_even_when_acknowledge_fails() {
        let harness = Harness::new();
        harness
            .client
            .fail(Operation::Acknowledge, ResponseCode::Error);
        let report = harness.reconcile(&[purchased("tok-1", "coins_100")]).await;

        assert_eq!(report.acknowledge_failures, 1);
        assert_eq!(report.consumed, 1);
        assert_eq!(
            harness.client.consumed_tokens(),
            vec![PurchaseToken::new("tok-1")]
        );
        assert!(harness
            .recorder
            .events()
            .contains(&ListenerEvent::PurchaseConsumed(PurchaseToken::new("tok-1"))));
    }

    #[tokio::test]
    async fn test_consumed_purchase_leaves_one_time_bucket() {
        let harness = Harness::new();
        let report = harness.reconcile(&[purchased("tok-1", "coins_100")]).await;

        assert_eq!(report.recorded, 1);
        assert_eq!(report.consumed, 1);
        assert_eq!(harness.ledger_len(ProductKind::OneTime).await, 0);
    }

    #[tokio::test]
    async fn test_consume_failure_reports_consume_error() {
        let harness = Harness::new();
        harness
            .client
            .fail(Operation::Consume, ResponseCode::ItemNotOwned);
        let report = harness.reconcile(&[purchased("tok-1", "coins_100")]).await;

        assert_eq!(report.consume_failures, 1);
        assert_eq!(harness.ledger_len(ProductKind::OneTime).await, 1);
        assert!(harness
            .recorder
            .events()
            .contains(&ListenerEvent::BillingError(BillingErrorKind::ConsumeError)));
    }

    #[tokio::test]
    async fn test_catalog_kind_wins_over_configured_lists() {
        let harness = Harness::new();
        // "basic" is configured as a subscription, but the catalog says one-time.
        harness.state.write().await.catalog.extend([Product {
            product_id: ProductId::new("basic"),
            kind: ProductKind::OneTime,
            title: "Basic".to_string(),
            description: String::new(),
            one_time_offer: Some(OneTimeOffer {
                price: Price::new("$1.99", 1_990_000, "USD"),
            }),
            subscription_offers: vec![],
        }]);
        harness.reconcile(&[purchased("tok-1", "basic")]).await;

        assert_eq!(harness.ledger_len(ProductKind::OneTime).await, 1);
        assert_eq!(harness.ledger_len(ProductKind::Subscription).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_acknowledged_but_not_recorded() {
        let harness = Harness::new();
        let report = harness.reconcile(&[purchased("tok-1", "mystery")]).await;

        assert_eq!(report.unknown_kind, 1);
        assert_eq!(report.acknowledged, 1);
        assert_eq!(report.recorded, 0);
        assert_eq!(harness.state.read().await.ledger.len(), 0);
    }

    #[tokio::test]
    async fn test_same_purchase_twice_is_recorded_twice() {
        let harness = Harness::new();
        let purchase = purchased("tok-1", "basic");
        harness.reconcile(&[purchase.clone()]).await;
        harness.reconcile(&[purchase]).await;

        assert_eq!(harness.ledger_len(ProductKind::Subscription).await, 2);
    }
}
