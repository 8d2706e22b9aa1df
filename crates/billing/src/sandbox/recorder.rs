//! Listener that records every callback, for tests and the CLI.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use premium_core::{BillingErrorKind, Purchase, PurchaseToken, ResponseCode};
use tokio::sync::watch;

use crate::error::BillingResponse;
use crate::listener::{ClientListener, PurchaseEventListener, Readiness};

/// One listener callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    ClientReady(Readiness),
    ClientInitError(ResponseCode),
    PurchasesUpdated,
    ClientAlreadyConnected,
    ProductsPurchased(Vec<PurchaseToken>),
    PurchaseAcknowledged(PurchaseToken),
    PurchaseConsumed(PurchaseToken),
    BillingError(BillingErrorKind),
}

/// Records callbacks in arrival order.
#[derive(Debug)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    seen: watch::Sender<usize>,
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> Self {
        let (seen, _) = watch::channel(0);
        Self {
            events: Mutex::new(Vec::new()),
            seen,
        }
    }

    fn record(&self, event: ListenerEvent) {
        let len = {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            events.push(event);
            events.len()
        };
        self.seen.send_replace(len);
    }

    #[must_use]
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&ListenerEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Wait until a recorded event satisfies `predicate`.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for(
        &self,
        predicate: impl Fn(&ListenerEvent) -> bool,
        timeout: Duration,
    ) -> bool {
        let mut seen = self.seen.subscribe();
        let found = async {
            loop {
                if self.count(&predicate) > 0 {
                    return true;
                }
                if seen.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, found).await.unwrap_or(false)
    }
}

impl ClientListener for RecordingListener {
    fn on_client_ready(&self, readiness: Readiness) {
        self.record(ListenerEvent::ClientReady(readiness));
    }

    fn on_client_init_error(&self, response: &BillingResponse) {
        self.record(ListenerEvent::ClientInitError(response.code));
    }

    fn on_purchases_updated(&self) {
        self.record(ListenerEvent::PurchasesUpdated);
    }

    fn on_client_already_connected(&self) {
        self.record(ListenerEvent::ClientAlreadyConnected);
    }
}

impl PurchaseEventListener for RecordingListener {
    fn on_products_purchased(&self, purchases: &[Purchase]) {
        self.record(ListenerEvent::ProductsPurchased(
            purchases.iter().map(|p| p.purchase_token.clone()).collect(),
        ));
    }

    fn on_purchase_acknowledged(&self, purchase: &Purchase) {
        self.record(ListenerEvent::PurchaseAcknowledged(
            purchase.purchase_token.clone(),
        ));
    }

    fn on_purchase_consumed(&self, purchase: &Purchase) {
        self.record(ListenerEvent::PurchaseConsumed(purchase.purchase_token.clone()));
    }

    fn on_billing_error(&self, kind: BillingErrorKind) {
        self.record(ListenerEvent::BillingError(kind));
    }
}
