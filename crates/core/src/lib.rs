//! Premium Helper Core - Shared billing domain types.
//!
//! This crate provides the types passed between the billing coordinator,
//! the external billing client, and the host application:
//! - `billing` - Coordinator, catalog cache, entitlement ledger, listeners
//! - `cli` - Command-line driver for sandbox sessions
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no async runtime, no
//! billing client. This keeps it lightweight and allows hosts to share the
//! types with their own UI layer.
//!
//! # Modules
//!
//! - [`types`] - Product keys, catalog entries, prices, purchases, response
//!   codes and the billing error taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
