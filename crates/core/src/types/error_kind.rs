//! Billing error taxonomy reported to the host application.
//!
//! Every failure of the external billing service, and every local lookup
//! failure, is converted to one of these kinds at the coordinator boundary
//! and delivered through the purchase event listener.

use serde::{Deserialize, Serialize};

/// Kind of billing error reported to the host.
///
/// Serialized in `SCREAMING_SNAKE_CASE` (e.g. `PRODUCT_NOT_EXIST`) so hosts
/// can log or forward the same names across platforms.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingErrorKind {
    /// Invalid arguments provided to the billing service.
    #[error("developer error: invalid arguments provided to the billing service")]
    DeveloperError,
    /// The coordinator is still connecting.
    #[error("billing client is not ready")]
    ClientNotReady,
    /// The coordinator has no live billing client.
    #[error("billing client is disconnected")]
    ClientDisconnected,
    /// No product matched the requested key.
    #[error("product does not exist")]
    ProductNotExist,
    /// The product exists but the requested offer does not.
    #[error("offer does not exist")]
    OfferNotExist,
    /// Generic billing failure.
    #[error("billing error")]
    BillingError,
    /// The user cancelled the purchase flow.
    #[error("user canceled")]
    UserCanceled,
    /// The network connection is down.
    #[error("billing service unavailable")]
    ServiceUnavailable,
    /// Billing is not supported on this device or account.
    #[error("billing unavailable")]
    BillingUnavailable,
    /// The product is not available for purchase.
    #[error("item unavailable")]
    ItemUnavailable,
    /// Fatal error during the billing action.
    #[error("fatal billing error")]
    Error,
    /// The item is already owned.
    #[error("item already owned")]
    ItemAlreadyOwned,
    /// The item is not owned.
    #[error("item not owned")]
    ItemNotOwned,
    /// The billing service disconnected or timed out.
    #[error("billing service disconnected")]
    ServiceDisconnected,
    /// Acknowledging a purchase failed.
    #[error("acknowledge error")]
    AcknowledgeError,
    /// A pending purchase cannot be acknowledged yet.
    #[error("acknowledge warning: purchase is pending")]
    AcknowledgeWarning,
    /// The purchase token of the subscription being replaced was not found.
    #[error("old purchase token not found")]
    OldPurchaseTokenNotFound,
    /// A product was requested with the wrong kind.
    #[error("invalid product type set")]
    InvalidProductTypeSet,
    /// Consuming a purchase failed.
    #[error("consume error")]
    ConsumeError,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&BillingErrorKind::ProductNotExist).unwrap(),
            "\"PRODUCT_NOT_EXIST\""
        );
        assert_eq!(
            serde_json::to_string(&BillingErrorKind::OldPurchaseTokenNotFound).unwrap(),
            "\"OLD_PURCHASE_TOKEN_NOT_FOUND\""
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BillingErrorKind::AcknowledgeWarning.to_string(),
            "acknowledge warning: purchase is pending"
        );
    }
}
