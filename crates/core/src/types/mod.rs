//! Core types for Premium Helper.
//!
//! This module provides type-safe wrappers for billing domain concepts.

pub mod error_kind;
pub mod key;
pub mod price;
pub mod product;
pub mod purchase;
pub mod status;

pub use error_kind::BillingErrorKind;
pub use key::{KeyError, ProductId, PurchaseToken};
pub use price::Price;
pub use product::{
    LIFETIME_PERIOD, OneTimeOffer, PriceInfo, PricingPhase, Product, ProductKind, RecurrenceMode,
    SubscriptionOffer,
};
pub use purchase::{Purchase, PurchaseTransitionError};
pub use status::*;
