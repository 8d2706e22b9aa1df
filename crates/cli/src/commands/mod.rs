//! CLI command implementations.

pub mod catalog;
pub mod purchase;
pub mod session;
