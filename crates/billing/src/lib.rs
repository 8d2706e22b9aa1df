//! Premium Helper billing coordinator.
//!
//! Sits between an external billing service and the host application. The
//! billing service owns connection handling, purchase validation,
//! acknowledgment, consumption and entitlement state; this crate owns the
//! in-process reconciliation between the two:
//!
//! - [`catalog`] - accumulated product and offer metadata
//! - [`ledger`] - acknowledged purchases, split by product kind
//! - [`connection`] - readiness of the billing channel
//! - [`pipeline`] - classify, acknowledge, consume and route purchases
//! - [`helper`] - the [`PremiumHelper`] facade the host talks to
//! - [`sandbox`] - in-memory billing client for development and tests
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use premium_billing::{BillingConfig, PremiumHelper};
//!
//! let config = BillingConfig::default()
//!     .with_subscription_keys(["basic"])
//!     .with_one_time_keys(["coins_100"])
//!     .with_consumable_keys(["coins_100"])
//!     .enable_logging(true);
//!
//! let helper = PremiumHelper::builder(config, Arc::new(play_client))
//!     .client_listener(Arc::new(MyClientListener))
//!     .event_listener(Arc::new(MyEventListener))
//!     .build()?;
//!
//! helper.initialize().await;
//! if helper.has_any_active_subscription().await {
//!     unlock_premium();
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

/// Coordinator chatter gated by [`BillingConfig::logging`].
///
/// Warnings and errors are always emitted with the plain `tracing` macros.
macro_rules! premium_log {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            ::tracing::info!($($arg)+);
        }
    };
}

pub mod catalog;
pub mod client;
pub mod config;
pub mod connection;
pub mod entitlement;
pub mod error;
pub mod helper;
pub mod ledger;
pub mod listener;
pub mod pipeline;
pub mod sandbox;
mod state;

pub use catalog::CatalogCache;
pub use client::{BillingClient, BillingFlowParams, ClientEvent, EventSender, SubscriptionUpdate};
pub use config::{BillingConfig, ConfigError};
pub use connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine, TransitionError};
pub use entitlement::EntitlementView;
pub use error::{BillingResponse, BillingResult};
pub use helper::{InitOutcome, PremiumHelper, PremiumHelperBuilder};
pub use ledger::EntitlementLedger;
pub use listener::{ClientListener, NoopListener, PurchaseEventListener, Readiness};
pub use pipeline::ReconcileReport;
