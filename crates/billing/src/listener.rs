//! Host-facing listener contracts.
//!
//! Both traits have no-op defaults so hosts only implement what they need.
//! Callbacks run on the coordinator's task and must not block.

use std::sync::Arc;

use premium_core::{BillingErrorKind, Purchase};

use crate::error::BillingResponse;

/// How complete the initial fetch group was when readiness was signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    /// Catalogs and purchases were fetched (possibly as empty results after a
    /// failed fetch).
    Complete,
    /// The fetch group did not finish within the ready timeout. Data keeps
    /// arriving and `on_purchases_updated` fires once it has.
    Degraded,
}

/// Connection lifecycle callbacks.
pub trait ClientListener: Send + Sync {
    fn on_client_ready(&self, _readiness: Readiness) {}

    /// Initial setup failed or the channel was lost.
    fn on_client_init_error(&self, _response: &BillingResponse) {}

    /// The ledger changed, or a fetch finished after readiness.
    fn on_purchases_updated(&self) {}

    /// `initialize` was called on an already initialized coordinator.
    fn on_client_already_connected(&self) {}
}

/// Purchase and error callbacks.
pub trait PurchaseEventListener: Send + Sync {
    /// A purchase-update push was reconciled.
    fn on_products_purchased(&self, _purchases: &[Purchase]) {}

    fn on_purchase_acknowledged(&self, _purchase: &Purchase) {}

    fn on_purchase_consumed(&self, _purchase: &Purchase) {}

    fn on_billing_error(&self, _kind: BillingErrorKind) {}
}

/// Listener that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ClientListener for NoopListener {}
impl PurchaseEventListener for NoopListener {}

/// Registered listeners, with no-op stand-ins for missing registrations.
#[derive(Clone)]
pub(crate) struct Listeners {
    pub(crate) client: Arc<dyn ClientListener>,
    pub(crate) events: Arc<dyn PurchaseEventListener>,
}

impl Default for Listeners {
    fn default() -> Self {
        Self {
            client: Arc::new(NoopListener),
            events: Arc::new(NoopListener),
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").finish_non_exhaustive()
    }
}
