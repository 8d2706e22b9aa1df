//! In-memory billing service for development and tests.
//!
//! [`SandboxBillingClient`] behaves like a connected billing service seeded
//! with a catalog and a set of owned purchases. Failures can be scripted per
//! operation, product queries can be held open to simulate a hung service,
//! and pushes (purchase updates, disconnects, reconnects) are driven by hand.
//!
//! # Example
//!
//! ```rust,ignore
//! use premium_billing::sandbox::{Operation, SandboxBillingClient};
//! use premium_core::{ProductKind, ResponseCode};
//!
//! let client = SandboxBillingClient::new().with_products(products);
//! client.fail(Operation::query_products(ProductKind::Subscription), ResponseCode::ServiceUnavailable);
//! client.hang_product_query(ProductKind::OneTime);
//! ```

mod recorder;
mod scenario;

pub use recorder::{ListenerEvent, RecordingListener};
pub use scenario::{OwnedPurchase, SandboxError, SandboxScenario, ScriptedFailure};

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use premium_core::{
    Feature, Product, ProductId, ProductKind, Purchase, PurchaseState, PurchaseToken,
    ResponseCode,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::client::{BillingClient, BillingFlowParams, ClientEvent, EventSender};
use crate::error::{BillingResponse, BillingResult};

// =============================================================================
// Operation / FlowOutcome / Call
// =============================================================================

/// Billing service operation that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    QuerySubscriptionProducts,
    QueryOneTimeProducts,
    QuerySubscriptionPurchases,
    QueryOneTimePurchases,
    Acknowledge,
    Consume,
    LaunchFlow,
}

impl Operation {
    #[must_use]
    pub const fn query_products(kind: ProductKind) -> Self {
        match kind {
            ProductKind::Subscription => Self::QuerySubscriptionProducts,
            ProductKind::OneTime => Self::QueryOneTimeProducts,
        }
    }

    #[must_use]
    pub const fn query_purchases(kind: ProductKind) -> Self {
        match kind {
            ProductKind::Subscription => Self::QuerySubscriptionPurchases,
            ProductKind::OneTime => Self::QueryOneTimePurchases,
        }
    }
}

/// What a launched purchase flow pushes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowOutcome {
    /// The user pays; a purchased, unacknowledged record is pushed.
    #[default]
    Complete,
    /// Payment is deferred; a pending record is pushed.
    Pending,
    /// The user backs out; a `USER_CANCELED` response is pushed.
    Cancel,
}

/// A call received by the sandbox, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartConnection,
    EndConnection,
    QueryProductDetails(ProductKind, Vec<ProductId>),
    QueryPurchases(ProductKind),
    Acknowledge(PurchaseToken),
    Consume(PurchaseToken),
    LaunchBillingFlow(BillingFlowParams),
}

// =============================================================================
// SandboxBillingClient
// =============================================================================

#[derive(Debug, Default)]
struct SandboxInner {
    products: Vec<Product>,
    owned: Vec<(ProductKind, Purchase)>,
    failures: HashMap<Operation, ResponseCode>,
    unsupported: HashSet<Feature>,
    hung: HashSet<ProductKind>,
    flow_outcome: FlowOutcome,
    events: Option<EventSender>,
    connected: bool,
    calls: Vec<Call>,
    acknowledged: Vec<PurchaseToken>,
    consumed: Vec<PurchaseToken>,
    next_order: u64,
}

/// In-memory [`BillingClient`].
#[derive(Debug)]
pub struct SandboxBillingClient {
    inner: Mutex<SandboxInner>,
    released: watch::Sender<bool>,
}

impl Default for SandboxBillingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxBillingClient {
    #[must_use]
    pub fn new() -> Self {
        let (released, _) = watch::channel(false);
        Self {
            inner: Mutex::new(SandboxInner::default()),
            released,
        }
    }

    /// Seed the catalog.
    #[must_use]
    pub fn with_products(self, products: impl IntoIterator<Item = Product>) -> Self {
        self.lock().products.extend(products);
        self
    }

    /// Seed a purchase the user already owns.
    #[must_use]
    pub fn with_owned(self, kind: ProductKind, purchase: Purchase) -> Self {
        self.grant(kind, purchase);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SandboxInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an owned purchase after construction.
    pub fn grant(&self, kind: ProductKind, purchase: Purchase) {
        self.lock().owned.push((kind, purchase));
    }

    /// Make every future call of `operation` fail with `code`.
    pub fn fail(&self, operation: Operation, code: ResponseCode) {
        self.lock().failures.insert(operation, code);
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: Operation) {
        self.lock().failures.remove(&operation);
    }

    pub fn set_feature_supported(&self, feature: Feature, supported: bool) {
        let mut inner = self.lock();
        if supported {
            inner.unsupported.remove(&feature);
        } else {
            inner.unsupported.insert(feature);
        }
    }

    pub fn set_flow_outcome(&self, outcome: FlowOutcome) {
        self.lock().flow_outcome = outcome;
    }

    /// Hold product queries of `kind` open until [`Self::release_hung_queries`].
    pub fn hang_product_query(&self, kind: ProductKind) {
        self.lock().hung.insert(kind);
        self.released.send_replace(false);
    }

    /// Let every held product query finish.
    pub fn release_hung_queries(&self) {
        self.lock().hung.clear();
        self.released.send_replace(true);
    }

    // -------------------------------------------------------------------------
    // Pushes
    // -------------------------------------------------------------------------

    fn push(&self, event: ClientEvent) -> bool {
        let inner = self.lock();
        match &inner.events {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Push a successful purchase update. Returns `false` when not connected.
    pub fn push_purchases(&self, purchases: Vec<Purchase>) -> bool {
        self.push(ClientEvent::PurchasesUpdated(Ok(purchases)))
    }

    /// Push a failed purchase update.
    pub fn push_error(&self, code: ResponseCode, debug_message: &str) -> bool {
        self.push(ClientEvent::PurchasesUpdated(Err(BillingResponse::new(
            code,
            debug_message,
        ))))
    }

    /// Settle a deferred payment: move the owned purchase `token` to `next`
    /// and push the updated record.
    ///
    /// Returns `false` when the transition is refused or nothing was pushed.
    pub fn settle_pending(&self, token: &PurchaseToken, next: PurchaseState) -> bool {
        let updated = {
            let mut inner = self.lock();
            let Some((_, purchase)) = inner
                .owned
                .iter_mut()
                .find(|(_, p)| p.purchase_token == *token)
            else {
                return false;
            };
            if let Err(e) = purchase.advance(next) {
                debug!(error = %e, "Sandbox refused purchase transition");
                return false;
            }
            purchase.clone()
        };
        if next == PurchaseState::Cancelled {
            self.lock().owned.retain(|(_, p)| p.purchase_token != *token);
        }
        self.push_purchases(vec![updated])
    }

    /// Drop the channel and notify the coordinator.
    pub fn disconnect(&self) -> bool {
        self.lock().connected = false;
        self.push(ClientEvent::ServiceDisconnected)
    }

    /// Restore the channel and notify the coordinator.
    pub fn reconnect(&self) -> bool {
        self.lock().connected = true;
        self.push(ClientEvent::ServiceReconnected)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Tokens acknowledged successfully, in order.
    #[must_use]
    pub fn acknowledged_tokens(&self) -> Vec<PurchaseToken> {
        self.lock().acknowledged.clone()
    }

    /// Tokens consumed successfully, in order.
    #[must_use]
    pub fn consumed_tokens(&self) -> Vec<PurchaseToken> {
        self.lock().consumed.clone()
    }

    /// Acknowledge calls, successful or not.
    #[must_use]
    pub fn acknowledge_attempts(&self) -> usize {
        self.count_calls(|call| matches!(call, Call::Acknowledge(_)))
    }

    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    #[must_use]
    pub fn owned(&self) -> Vec<Purchase> {
        self.lock().owned.iter().map(|(_, p)| p.clone()).collect()
    }

    /// Record `call` and return the scripted failure for `operation`, if any.
    fn enter(&self, call: Call, operation: Operation) -> BillingResult<()> {
        let mut inner = self.lock();
        inner.calls.push(call);
        match inner.failures.get(&operation) {
            Some(&code) => Err(BillingResponse::new(
                code,
                format!("sandbox: scripted {operation:?} failure"),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BillingClient for SandboxBillingClient {
    async fn start_connection(&self, events: EventSender) -> BillingResult<()> {
        self.enter(Call::StartConnection, Operation::Connect)?;
        let mut inner = self.lock();
        inner.events = Some(events);
        inner.connected = true;
        debug!("Sandbox billing connected");
        Ok(())
    }

    async fn end_connection(&self) {
        let mut inner = self.lock();
        inner.calls.push(Call::EndConnection);
        inner.events = None;
        inner.connected = false;
    }

    fn is_ready(&self) -> bool {
        self.lock().connected
    }

    fn is_feature_supported(&self, feature: Feature) -> ResponseCode {
        let inner = self.lock();
        if !inner.connected {
            ResponseCode::ServiceDisconnected
        } else if inner.unsupported.contains(&feature) {
            ResponseCode::FeatureNotSupported
        } else {
            ResponseCode::Ok
        }
    }

    async fn query_product_details(
        &self,
        product_ids: &[ProductId],
        kind: ProductKind,
    ) -> BillingResult<Vec<Product>> {
        self.enter(
            Call::QueryProductDetails(kind, product_ids.to_vec()),
            Operation::query_products(kind),
        )?;

        let hung = self.lock().hung.contains(&kind);
        if hung {
            let mut released = self.released.subscribe();
            // A closed channel means the sandbox is gone; finish either way.
            let _ = released.wait_for(|released| *released).await;
        }

        let inner = self.lock();
        Ok(inner
            .products
            .iter()
            .filter(|product| product.kind == kind && product_ids.contains(&product.product_id))
            .cloned()
            .collect())
    }

    async fn query_purchases(&self, kind: ProductKind) -> BillingResult<Vec<Purchase>> {
        self.enter(Call::QueryPurchases(kind), Operation::query_purchases(kind))?;
        Ok(self
            .lock()
            .owned
            .iter()
            .filter(|(owned_kind, _)| *owned_kind == kind)
            .map(|(_, purchase)| purchase.clone())
            .collect())
    }

    async fn acknowledge_purchase(&self, token: &PurchaseToken) -> BillingResult<()> {
        self.enter(Call::Acknowledge(token.clone()), Operation::Acknowledge)?;
        let mut inner = self.lock();
        for (_, purchase) in inner
            .owned
            .iter_mut()
            .filter(|(_, p)| p.purchase_token == *token)
        {
            purchase.acknowledged = true;
        }
        inner.acknowledged.push(token.clone());
        Ok(())
    }

    async fn consume_purchase(&self, token: &PurchaseToken) -> BillingResult<()> {
        self.enter(Call::Consume(token.clone()), Operation::Consume)?;
        let mut inner = self.lock();
        inner.owned.retain(|(_, p)| p.purchase_token != *token);
        inner.consumed.push(token.clone());
        Ok(())
    }

    async fn launch_billing_flow(&self, params: &BillingFlowParams) -> BillingResult<()> {
        self.enter(Call::LaunchBillingFlow(params.clone()), Operation::LaunchFlow)?;

        let event = {
            let mut inner = self.lock();
            inner.next_order += 1;
            let order = inner.next_order;
            let outcome = inner.flow_outcome;
            match outcome {
                FlowOutcome::Cancel => ClientEvent::PurchasesUpdated(Err(BillingResponse::new(
                    ResponseCode::UserCanceled,
                    "sandbox: user canceled",
                ))),
                outcome => {
                    let state = if outcome == FlowOutcome::Pending {
                        PurchaseState::Pending
                    } else {
                        PurchaseState::Purchased
                    };
                    let mut purchase = Purchase::new(
                        format!("sandbox-token-{order}"),
                        params.product_id.clone(),
                        state,
                    );
                    purchase.order_id = Some(format!("SANDBOX.{order:04}"));
                    purchase.auto_renewing = params.kind == ProductKind::Subscription;

                    if let Some(update) = &params.subscription_update {
                        inner
                            .owned
                            .retain(|(_, p)| p.purchase_token != update.old_purchase_token);
                    }
                    inner.owned.push((params.kind, purchase.clone()));
                    ClientEvent::PurchasesUpdated(Ok(vec![purchase]))
                }
            }
        };

        self.push(event);
        Ok(())
    }
}
