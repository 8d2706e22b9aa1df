//! Contract with the external billing service.
//!
//! The coordinator never talks to the platform SDK directly. Everything goes
//! through [`BillingClient`], which keeps the reconciliation logic testable
//! against the in-memory [`crate::sandbox::SandboxBillingClient`].

use async_trait::async_trait;
use premium_core::{
    Feature, Product, ProductId, ProductKind, Purchase, PurchaseToken, ReplacementMode,
    ResponseCode,
};
use tokio::sync::mpsc;

use crate::error::BillingResult;

/// Push notification from the billing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Result of a buy flow, or purchases the service surfaced on its own.
    PurchasesUpdated(BillingResult<Vec<Purchase>>),
    /// The channel to the billing service was lost.
    ServiceDisconnected,
    /// The billing service re-established the channel on its own.
    ServiceReconnected,
}

/// Sending half handed to [`BillingClient::start_connection`].
pub type EventSender = mpsc::UnboundedSender<ClientEvent>;

/// Replacement of an existing subscription during a buy flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    /// Token of the purchase being replaced.
    pub old_purchase_token: PurchaseToken,
    /// How the old plan is replaced.
    pub replacement_mode: ReplacementMode,
}

/// Parameters for launching a purchase flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingFlowParams {
    pub product_id: ProductId,
    pub kind: ProductKind,
    /// Offer token; required for subscriptions.
    pub offer_token: Option<String>,
    /// Whether the price was personalized for this user.
    pub is_offer_personalized: bool,
    pub subscription_update: Option<SubscriptionUpdate>,
}

/// External billing service.
///
/// Every call either succeeds with its payload or fails with a
/// [`crate::BillingResponse`].
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Open the channel. Pushes are delivered through `events` for as long
    /// as the connection lives, including after automatic reconnects.
    async fn start_connection(&self, events: EventSender) -> BillingResult<()>;

    /// Close the channel and stop delivering pushes.
    async fn end_connection(&self);

    /// Returns `true` while the channel is usable.
    fn is_ready(&self) -> bool;

    /// Feature support check.
    fn is_feature_supported(&self, feature: Feature) -> ResponseCode;

    /// Fetch product details for a batch of ids of one kind.
    async fn query_product_details(
        &self,
        product_ids: &[ProductId],
        kind: ProductKind,
    ) -> BillingResult<Vec<Product>>;

    /// Fetch purchases the user currently owns of one kind.
    async fn query_purchases(&self, kind: ProductKind) -> BillingResult<Vec<Purchase>>;

    async fn acknowledge_purchase(&self, token: &PurchaseToken) -> BillingResult<()>;

    async fn consume_purchase(&self, token: &PurchaseToken) -> BillingResult<()>;

    /// Start the purchase UI. The outcome arrives later as
    /// [`ClientEvent::PurchasesUpdated`].
    async fn launch_billing_flow(&self, params: &BillingFlowParams) -> BillingResult<()>;
}
