//! YAML seed files for the sandbox billing service.
//!
//! ```yaml
//! subscription_keys: [basic]
//! one_time_keys: [coins_100]
//! consumable_keys: [coins_100]
//! products:
//!   - product_id: basic
//!     kind: subs
//!     title: Basic
//!     subscription_offers:
//!       - base_plan_id: basic
//!         offer_token: tok-basic
//!         pricing_phases:
//!           - price: { formatted: "$4.99", amount_micros: 4990000, currency_code: USD }
//!             billing_period: P1M
//! owned:
//!   - kind: subs
//!     purchase_token: tok-1
//!     product_ids: [basic]
//!     state: PURCHASED
//!     acknowledged: true
//! failures:
//!   - operation: consume
//!     code: ITEM_NOT_OWNED
//! flow_outcome: complete
//! ```

use std::path::Path;

use premium_core::{Product, ProductKind, Purchase, ResponseCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FlowOutcome, Operation, SandboxBillingClient};
use crate::config::BillingConfig;

/// Errors loading a scenario file.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid scenario: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A purchase the sandbox user already owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedPurchase {
    pub kind: ProductKind,
    #[serde(flatten)]
    pub purchase: Purchase,
}

/// An operation that always fails in this scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedFailure {
    pub operation: Operation,
    pub code: ResponseCode,
}

/// Seed data for a [`SandboxBillingClient`] plus the keys to configure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxScenario {
    pub subscription_keys: Vec<String>,
    pub one_time_keys: Vec<String>,
    pub consumable_keys: Vec<String>,
    pub products: Vec<Product>,
    pub owned: Vec<OwnedPurchase>,
    pub failures: Vec<ScriptedFailure>,
    pub flow_outcome: FlowOutcome,
}

impl SandboxScenario {
    /// Parse a scenario from YAML.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Yaml` if the document does not match the
    /// scenario shape.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SandboxError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a scenario file.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError` if the file cannot be read or parsed.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SandboxError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml_str(&yaml)
    }

    /// Returns `true` if the scenario names any product keys.
    #[must_use]
    pub fn has_keys(&self) -> bool {
        !(self.subscription_keys.is_empty() && self.one_time_keys.is_empty())
    }

    /// Configuration with this scenario's keys.
    #[must_use]
    pub fn billing_config(&self) -> BillingConfig {
        BillingConfig::default()
            .with_subscription_keys(self.subscription_keys.iter().map(String::as_str))
            .with_one_time_keys(self.one_time_keys.iter().map(String::as_str))
            .with_consumable_keys(self.consumable_keys.iter().map(String::as_str))
    }

    /// Build a sandbox client seeded with this scenario.
    #[must_use]
    pub fn into_client(self) -> SandboxBillingClient {
        let client = SandboxBillingClient::new().with_products(self.products);
        for owned in self.owned {
            client.grant(owned.kind, owned.purchase);
        }
        for failure in self.failures {
            client.fail(failure.operation, failure.code);
        }
        client.set_flow_outcome(self.flow_outcome);
        client
    }
}
