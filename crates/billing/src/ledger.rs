//! Acknowledged purchases, split by product kind.

use premium_core::{ProductKind, Purchase, PurchaseToken};

/// Acknowledged purchases in insertion order.
///
/// Entries are appended without token deduplication, so a purchase reported
/// by both a push and a re-query appears twice.
#[derive(Debug, Clone, Default)]
pub struct EntitlementLedger {
    subscriptions: Vec<Purchase>,
    one_time: Vec<Purchase>,
}

impl EntitlementLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            one_time: Vec::new(),
        }
    }

    /// Append an acknowledged purchase to the bucket for `kind`.
    pub fn record(&mut self, kind: ProductKind, purchase: Purchase) {
        self.bucket_mut(kind).push(purchase);
    }

    /// Drop every one-time entry with `token`. Returns how many were removed.
    pub fn remove_consumed(&mut self, token: &PurchaseToken) -> usize {
        let before = self.one_time.len();
        self.one_time.retain(|p| p.purchase_token != *token);
        before - self.one_time.len()
    }

    #[must_use]
    pub fn bucket(&self, kind: ProductKind) -> &[Purchase] {
        match kind {
            ProductKind::Subscription => &self.subscriptions,
            ProductKind::OneTime => &self.one_time,
        }
    }

    fn bucket_mut(&mut self, kind: ProductKind) -> &mut Vec<Purchase> {
        match kind {
            ProductKind::Subscription => &mut self.subscriptions,
            ProductKind::OneTime => &mut self.one_time,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len() + self.one_time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.one_time.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use premium_core::PurchaseState;

    use super::*;

    #[test]
    fn test_record_goes_to_kind_bucket() {
        let mut ledger = EntitlementLedger::new();
        ledger.record(
            ProductKind::Subscription,
            Purchase::new("tok-1", "basic", PurchaseState::Purchased),
        );
        ledger.record(
            ProductKind::OneTime,
            Purchase::new("tok-2", "coins_100", PurchaseState::Purchased),
        );
        assert_eq!(ledger.bucket(ProductKind::Subscription).len(), 1);
        assert_eq!(ledger.bucket(ProductKind::OneTime).len(), 1);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_same_token_twice_is_kept_twice() {
        let mut ledger = EntitlementLedger::new();
        let purchase = Purchase::new("tok-1", "basic", PurchaseState::Purchased);
        ledger.record(ProductKind::Subscription, purchase.clone());
        ledger.record(ProductKind::Subscription, purchase);
        assert_eq!(ledger.bucket(ProductKind::Subscription).len(), 2);
    }

    #[test]
    fn test_remove_consumed_only_touches_one_time() {
        let mut ledger = EntitlementLedger::new();
        ledger.record(
            ProductKind::OneTime,
            Purchase::new("tok-1", "coins_100", PurchaseState::Purchased),
        );
        ledger.record(
            ProductKind::Subscription,
            Purchase::new("tok-1", "basic", PurchaseState::Purchased),
        );
        assert_eq!(ledger.remove_consumed(&PurchaseToken::new("tok-1")), 1);
        assert!(ledger.bucket(ProductKind::OneTime).is_empty());
        assert_eq!(ledger.bucket(ProductKind::Subscription).len(), 1);
        assert_eq!(ledger.remove_consumed(&PurchaseToken::new("tok-1")), 0);
    }
}
