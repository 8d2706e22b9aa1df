//! Failure value returned by the external billing service.

use premium_core::{BillingErrorKind, ResponseCode};
use thiserror::Error;

/// A non-OK response from the billing service.
///
/// Every call into the billing service either succeeds with its payload or
/// fails with a response code and the service's debug message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("billing service returned {code}: {debug_message}")]
pub struct BillingResponse {
    /// Response code.
    pub code: ResponseCode,
    /// Diagnostic message from the billing service (not for end users).
    pub debug_message: String,
}

impl BillingResponse {
    /// Create a new failure response.
    #[must_use]
    pub fn new(code: ResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    /// Error kind reported to the host for this response.
    ///
    /// An `Ok` code wrapped as a failure is treated as a generic error.
    #[must_use]
    pub const fn error_kind(&self) -> BillingErrorKind {
        match self.code.error_kind() {
            Some(kind) => kind,
            None => BillingErrorKind::Error,
        }
    }
}

impl From<ResponseCode> for BillingResponse {
    fn from(code: ResponseCode) -> Self {
        Self::new(code, String::new())
    }
}

/// Result type for calls into the billing service.
pub type BillingResult<T> = std::result::Result<T, BillingResponse>;
