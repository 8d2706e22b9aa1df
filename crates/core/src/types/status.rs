//! Status enums exchanged with the billing service.

use serde::{Deserialize, Serialize};

use super::error_kind::BillingErrorKind;

/// Purchase lifecycle state.
///
/// Maps to the billing service's purchase state values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseState {
    /// Payment has not completed yet (e.g. cash at a convenience store).
    #[default]
    Pending,
    /// Payment completed; entitlement can be granted after acknowledgment.
    Purchased,
    /// The purchase was cancelled before completing.
    Cancelled,
}

impl PurchaseState {
    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying in the same state is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, _) | (Self::Purchased, Self::Purchased) | (Self::Cancelled, Self::Cancelled)
        )
    }
}

/// Response code returned by every call into the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    /// The request reached its deadline before a response arrived.
    ServiceTimeout,
    /// The requested feature is not supported by the device.
    FeatureNotSupported,
    /// The app is not connected to the billing service.
    ServiceDisconnected,
    /// Success.
    Ok,
    /// The user pressed back or cancelled a dialog.
    UserCanceled,
    /// The network connection is down.
    ServiceUnavailable,
    /// The billing API version is not supported for the type requested.
    BillingUnavailable,
    /// The requested product is not available for purchase.
    ItemUnavailable,
    /// Invalid arguments provided to the API.
    DeveloperError,
    /// Fatal error during the API action.
    Error,
    /// Failure to purchase since the item is already owned.
    ItemAlreadyOwned,
    /// Failure to consume since the item is not owned.
    ItemNotOwned,
    /// A network error occurred during the operation.
    NetworkError,
}

impl ResponseCode {
    /// Numeric code used by the billing service.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ServiceTimeout => -3,
            Self::FeatureNotSupported => -2,
            Self::ServiceDisconnected => -1,
            Self::Ok => 0,
            Self::UserCanceled => 1,
            Self::ServiceUnavailable => 2,
            Self::BillingUnavailable => 3,
            Self::ItemUnavailable => 4,
            Self::DeveloperError => 5,
            Self::Error => 6,
            Self::ItemAlreadyOwned => 7,
            Self::ItemNotOwned => 8,
            Self::NetworkError => 12,
        }
    }

    /// Parse a numeric code; unknown codes map to [`ResponseCode::Error`].
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -3 => Self::ServiceTimeout,
            -2 => Self::FeatureNotSupported,
            -1 => Self::ServiceDisconnected,
            0 => Self::Ok,
            1 => Self::UserCanceled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            12 => Self::NetworkError,
            _ => Self::Error,
        }
    }

    /// Returns `true` for [`ResponseCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Map a failure code to the error kind reported to the host.
    ///
    /// Returns `None` for [`ResponseCode::Ok`].
    #[must_use]
    pub const fn error_kind(self) -> Option<BillingErrorKind> {
        let kind = match self {
            Self::Ok => return None,
            Self::UserCanceled => BillingErrorKind::UserCanceled,
            Self::ServiceUnavailable => BillingErrorKind::ServiceUnavailable,
            Self::BillingUnavailable => BillingErrorKind::BillingUnavailable,
            Self::ItemUnavailable => BillingErrorKind::ItemUnavailable,
            Self::DeveloperError => BillingErrorKind::DeveloperError,
            Self::ItemAlreadyOwned => BillingErrorKind::ItemAlreadyOwned,
            Self::ItemNotOwned => BillingErrorKind::ItemNotOwned,
            Self::ServiceDisconnected | Self::ServiceTimeout => {
                BillingErrorKind::ServiceDisconnected
            }
            Self::Error | Self::FeatureNotSupported | Self::NetworkError => BillingErrorKind::Error,
        };
        Some(kind)
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({})", self.code())
    }
}

/// Optional billing features a device may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Subscriptions in general.
    Subscriptions,
    /// Upgrading or downgrading an existing subscription.
    SubscriptionsUpdate,
    /// Product details queries.
    ProductDetails,
}

/// How an existing subscription is replaced during an upgrade or downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMode {
    /// Replacement takes effect immediately; remaining time is prorated.
    #[default]
    WithTimeProration,
    /// Replacement takes effect immediately; the price difference is charged.
    ChargeProratedPrice,
    /// Replacement takes effect immediately; new price charged next period.
    WithoutProration,
    /// Replacement takes effect immediately; full price charged now.
    ChargeFullPrice,
    /// Replacement takes effect when the old plan expires.
    Deferred,
}

impl ReplacementMode {
    /// Numeric mode used by the billing service.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::WithTimeProration => 1,
            Self::ChargeProratedPrice => 2,
            Self::WithoutProration => 3,
            Self::ChargeFullPrice => 5,
            Self::Deferred => 6,
        }
    }
}
