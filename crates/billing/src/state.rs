//! Mutable state owned by a single coordinator.

use crate::catalog::CatalogCache;
use crate::connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine};
use crate::entitlement::EntitlementView;
use crate::ledger::EntitlementLedger;

/// Catalog, ledger and connection state behind the coordinator's lock.
///
/// Every mutation goes through `tokio::sync::RwLock<BillingState>`; the lock
/// is never held across a call into the billing service or a listener.
#[derive(Debug, Default)]
pub(crate) struct BillingState {
    pub(crate) connection: ConnectionStateMachine,
    pub(crate) catalog: CatalogCache,
    pub(crate) ledger: EntitlementLedger,
    /// Set by `initialize`, cleared by `release` or a failed initial setup.
    pub(crate) initialized: bool,
}

impl BillingState {
    pub(crate) const fn entitlements(&self) -> EntitlementView<'_> {
        EntitlementView::new(&self.catalog, &self.ledger)
    }

    /// Apply a connection event, logging illegal transitions instead of
    /// failing the caller.
    pub(crate) fn transition(&mut self, event: ConnectionEvent) -> ConnectionState {
        match self.connection.apply(event) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring connection event");
                self.connection.state()
            }
        }
    }
}
