//! Billing configuration, set before `initialize`.
//!
//! Built in code with the `with_*` builder methods, or loaded from
//! environment variables with [`BillingConfig::from_env`].
//!
//! # Environment Variables
//!
//! All optional:
//! - `PREMIUM_SUBSCRIPTION_KEYS` - Comma-separated subscription product ids
//! - `PREMIUM_ONE_TIME_KEYS` - Comma-separated one-time product ids
//! - `PREMIUM_CONSUMABLE_KEYS` - Comma-separated consumable product ids
//!   (must also appear in `PREMIUM_ONE_TIME_KEYS`)
//! - `PREMIUM_LOGGING` - Enable coordinator logging (default: false)
//! - `PREMIUM_READY_TIMEOUT_SECS` - Bound on the post-connect fetch group
//!   before readiness is signalled as degraded (default: 30)

use std::time::Duration;

use premium_core::{KeyError, ProductId, ProductKind};
use thiserror::Error;

const DEFAULT_READY_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading or validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid product key {key:?} in {list}: {source}")]
    InvalidKey {
        list: &'static str,
        key: String,
        source: KeyError,
    },
    #[error("Consumable key {0:?} is not listed as a one-time product")]
    ConsumableNotOneTime(String),
    #[error("Ready timeout must be greater than zero")]
    ZeroReadyTimeout,
}

/// Billing coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Subscription product ids, in the order they are queried.
    pub subscription_keys: Vec<ProductId>,
    /// One-time product ids, in the order they are queried.
    pub one_time_keys: Vec<ProductId>,
    /// One-time product ids that are consumed after purchase.
    pub consumable_keys: Vec<ProductId>,
    /// Emit coordinator info logs.
    pub logging: bool,
    /// Longest wait for the post-connect fetch group.
    pub ready_timeout: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            subscription_keys: Vec::new(),
            one_time_keys: Vec::new(),
            consumable_keys: Vec::new(),
            logging: false,
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
        }
    }
}

impl BillingConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the resulting
    /// configuration fails [`BillingConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let list = |key: &str| -> Vec<ProductId> {
            lookup(key)
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ProductId::new)
                        .collect()
                })
                .unwrap_or_default()
        };

        let logging = match lookup("PREMIUM_LOGGING") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidEnvVar("PREMIUM_LOGGING".to_string(), value.clone())
            })?,
            None => false,
        };

        let ready_timeout = match lookup("PREMIUM_READY_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("PREMIUM_READY_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            None => DEFAULT_READY_TIMEOUT_SECS,
        };

        let config = Self {
            subscription_keys: list("PREMIUM_SUBSCRIPTION_KEYS"),
            one_time_keys: list("PREMIUM_ONE_TIME_KEYS"),
            consumable_keys: list("PREMIUM_CONSUMABLE_KEYS"),
            logging,
            ready_timeout: Duration::from_secs(ready_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    /// Append subscription product ids.
    #[must_use]
    pub fn with_subscription_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.subscription_keys
            .extend(keys.into_iter().map(ProductId::new));
        self
    }

    /// Append one-time product ids.
    #[must_use]
    pub fn with_one_time_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.one_time_keys
            .extend(keys.into_iter().map(ProductId::new));
        self
    }

    /// Append consumable product ids.
    #[must_use]
    pub fn with_consumable_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.consumable_keys
            .extend(keys.into_iter().map(ProductId::new));
        self
    }

    /// Turn coordinator logging on or off.
    #[must_use]
    pub const fn enable_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Set the bound on the post-connect fetch group.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Check every key and the consumable/one-time relationship.
    ///
    /// # Errors
    ///
    /// Returns the first invalid key, a consumable key missing from the
    /// one-time list, or a zero ready timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (list, keys) in [
            ("subscription_keys", &self.subscription_keys),
            ("one_time_keys", &self.one_time_keys),
            ("consumable_keys", &self.consumable_keys),
        ] {
            for key in keys {
                ProductId::parse(key.as_str()).map_err(|source| ConfigError::InvalidKey {
                    list,
                    key: key.to_string(),
                    source,
                })?;
            }
        }

        if let Some(stray) = self
            .consumable_keys
            .iter()
            .find(|key| !self.one_time_keys.contains(key))
        {
            return Err(ConfigError::ConsumableNotOneTime(stray.to_string()));
        }

        if self.ready_timeout.is_zero() {
            return Err(ConfigError::ZeroReadyTimeout);
        }

        Ok(())
    }

    /// Product ids queried for a product kind.
    #[must_use]
    pub fn keys_for(&self, kind: ProductKind) -> &[ProductId] {
        match kind {
            ProductKind::Subscription => &self.subscription_keys,
            ProductKind::OneTime => &self.one_time_keys,
        }
    }

    /// Kind a product id was configured under, if any.
    #[must_use]
    pub fn configured_kind(&self, product_id: &ProductId) -> Option<ProductKind> {
        if self.subscription_keys.contains(product_id) {
            Some(ProductKind::Subscription)
        } else if self.one_time_keys.contains(product_id) {
            Some(ProductKind::OneTime)
        } else {
            None
        }
    }

    /// Returns `true` if purchases of `product_id` are consumed.
    #[must_use]
    pub fn is_consumable(&self, product_id: &ProductId) -> bool {
        self.consumable_keys.contains(product_id)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
