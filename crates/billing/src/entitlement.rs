//! Entitlement checks over the ledger and catalog.
//!
//! Nothing here is cached: every check rescans both collections, so answers
//! always reflect the latest reconciliation.

use premium_core::{ProductKind, PurchaseToken};

use crate::catalog::CatalogCache;
use crate::ledger::EntitlementLedger;

/// Read-only view used to answer entitlement questions.
#[derive(Debug, Clone, Copy)]
pub struct EntitlementView<'a> {
    catalog: &'a CatalogCache,
    ledger: &'a EntitlementLedger,
}

impl<'a> EntitlementView<'a> {
    #[must_use]
    pub const fn new(catalog: &'a CatalogCache, ledger: &'a EntitlementLedger) -> Self {
        Self { catalog, ledger }
    }

    /// Returns `true` if any acknowledged subscription is on the ledger.
    #[must_use]
    pub fn has_any_active_subscription(&self) -> bool {
        !self.ledger.bucket(ProductKind::Subscription).is_empty()
    }

    /// Returns `true` if an acknowledged subscription belongs to a product
    /// that offers `base_plan_id`.
    #[must_use]
    pub fn has_active_subscription_for_base_plan(&self, base_plan_id: &str) -> bool {
        self.ledger
            .bucket(ProductKind::Subscription)
            .iter()
            .filter_map(|purchase| purchase.primary_product())
            .any(|product_id| {
                self.catalog.products().iter().any(|product| {
                    product.kind == ProductKind::Subscription
                        && product.product_id == *product_id
                        && product.has_base_plan(base_plan_id)
                })
            })
    }

    #[must_use]
    pub fn has_active_subscription_for_product(&self, product_id: &str) -> bool {
        self.ledger
            .bucket(ProductKind::Subscription)
            .iter()
            .any(|purchase| purchase.covers(product_id))
    }

    #[must_use]
    pub fn has_active_one_time_purchase(&self) -> bool {
        !self.ledger.bucket(ProductKind::OneTime).is_empty()
    }

    #[must_use]
    pub fn has_active_one_time_purchase_for_product(&self, product_id: &str) -> bool {
        self.ledger
            .bucket(ProductKind::OneTime)
            .iter()
            .any(|purchase| purchase.covers(product_id))
    }

    /// Token of the subscription currently held on the product that owns
    /// `base_plan_id`, used when replacing that plan.
    #[must_use]
    pub fn old_purchase_token(&self, base_plan_id: &str) -> Option<&'a PurchaseToken> {
        let product = self.catalog.subscription_product_for_base_plan(base_plan_id)?;
        self.ledger
            .bucket(ProductKind::Subscription)
            .iter()
            .find(|purchase| purchase.primary_product() == Some(&product.product_id))
            .map(|purchase| &purchase.purchase_token)
    }
}
