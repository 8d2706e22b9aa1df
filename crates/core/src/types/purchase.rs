//! Purchases reported by the billing service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{ProductId, PurchaseToken};
use super::status::PurchaseState;

/// Returned when a purchase is asked to move backwards in its lifecycle.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal purchase transition {from:?} -> {to:?} for {token}")]
pub struct PurchaseTransitionError {
    /// Token of the purchase.
    pub token: PurchaseToken,
    /// State the purchase was in.
    pub from: PurchaseState,
    /// State that was requested.
    pub to: PurchaseState,
}

/// A purchase grant.
///
/// The token is unique per grant. A purchase only moves forward:
/// `Pending -> Purchased -> acknowledged`, or `Pending -> Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Opaque token identifying this grant.
    pub purchase_token: PurchaseToken,
    /// Products covered by this grant (first entry is the primary product).
    pub product_ids: Vec<ProductId>,
    /// Lifecycle state.
    pub state: PurchaseState,
    /// Whether the grant has been acknowledged to the billing service.
    #[serde(default)]
    pub acknowledged: bool,
    /// Order id assigned by the billing service.
    #[serde(default)]
    pub order_id: Option<String>,
    /// Time of purchase.
    #[serde(default)]
    pub purchase_time: DateTime<Utc>,
    /// Quantity purchased.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Whether a subscription renews automatically.
    #[serde(default)]
    pub auto_renewing: bool,
}

const fn default_quantity() -> u32 {
    1
}

impl Purchase {
    /// Create a new, unacknowledged purchase of a single product.
    #[must_use]
    pub fn new(
        purchase_token: impl Into<PurchaseToken>,
        product_id: impl Into<ProductId>,
        state: PurchaseState,
    ) -> Self {
        Self {
            purchase_token: purchase_token.into(),
            product_ids: vec![product_id.into()],
            state,
            acknowledged: false,
            order_id: None,
            purchase_time: Utc::now(),
            quantity: 1,
            auto_renewing: false,
        }
    }

    /// The primary product of this purchase.
    #[must_use]
    pub fn primary_product(&self) -> Option<&ProductId> {
        self.product_ids.first()
    }

    /// Returns `true` if this purchase covers `product_id`.
    #[must_use]
    pub fn covers(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id.as_str() == product_id)
    }

    /// Move the purchase to a new state.
    ///
    /// # Errors
    ///
    /// Returns `PurchaseTransitionError` if the transition would move the
    /// purchase backwards.
    pub fn advance(&mut self, next: PurchaseState) -> Result<(), PurchaseTransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(PurchaseTransitionError {
                token: self.purchase_token.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Mark the purchase acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `PurchaseTransitionError` unless the purchase is `Purchased`.
    pub fn acknowledge(&mut self) -> Result<(), PurchaseTransitionError> {
        if self.state != PurchaseState::Purchased {
            return Err(PurchaseTransitionError {
                token: self.purchase_token.clone(),
                from: self.state,
                to: PurchaseState::Purchased,
            });
        }
        self.acknowledged = true;
        Ok(())
    }
}
