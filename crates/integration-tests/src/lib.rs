//! Integration tests for Premium Helper.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p premium-integration-tests
//! ```
//!
//! Every test drives a real [`PremiumHelper`] against the in-memory
//! [`SandboxBillingClient`]; no device or store account is needed.
//!
//! # Test Categories
//!
//! - `connection` - initialize, readiness, disconnect and reconnect
//! - `reconciliation` - purchase pipeline through pushes and re-queries
//! - `catalog` - lookups and price listings
//! - `entitlements` - entitlement checks and subscription replacement
//! - `scenario` - YAML scenarios, including the bundled demo

use std::sync::Arc;
use std::time::Duration;

use premium_billing::sandbox::{RecordingListener, SandboxBillingClient};
use premium_billing::{BillingConfig, PremiumHelper};
use premium_core::{
    OneTimeOffer, Price, PricingPhase, Product, ProductId, ProductKind, RecurrenceMode,
    SubscriptionOffer,
};

/// Upper bound on waiting for an asynchronous listener callback.
pub const EVENT_WAIT: Duration = Duration::from_secs(2);

/// A coordinator wired to a sandbox and a recording listener.
pub struct TestContext {
    pub helper: PremiumHelper,
    pub client: Arc<SandboxBillingClient>,
    pub recorder: Arc<RecordingListener>,
}

impl TestContext {
    /// Build a context with [`default_config`] around `client`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn new(client: SandboxBillingClient) -> Self {
        Self::with_config(default_config(), client)
    }

    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_config(config: BillingConfig, client: SandboxBillingClient) -> Self {
        let client = Arc::new(client);
        let recorder = Arc::new(RecordingListener::new());
        let helper = PremiumHelper::builder(config, client.clone())
            .client_listener(recorder.clone())
            .event_listener(recorder.clone())
            .build()
            .expect("test configuration is valid");
        Self {
            helper,
            client,
            recorder,
        }
    }
}

/// Keys for the [`catalog`] products; `coins_100` is consumable.
#[must_use]
pub fn default_config() -> BillingConfig {
    BillingConfig::default()
        .with_subscription_keys(["basic", "premium"])
        .with_one_time_keys(["coins_100", "remove_ads"])
        .with_consumable_keys(["coins_100"])
        .with_ready_timeout(Duration::from_millis(250))
}

fn phase(formatted: &str, micros: i64, period: &str) -> PricingPhase {
    PricingPhase {
        price: Price::new(formatted, micros, "USD"),
        billing_period: period.to_string(),
        billing_cycle_count: 0,
        recurrence_mode: RecurrenceMode::InfiniteRecurring,
    }
}

/// Subscription offer with a single monthly phase.
#[must_use]
pub fn monthly_offer(base_plan: &str, offer_id: Option<&str>, formatted: &str) -> SubscriptionOffer {
    SubscriptionOffer {
        base_plan_id: base_plan.to_string(),
        offer_id: offer_id.map(str::to_string),
        offer_token: format!("tok-{base_plan}-{}", offer_id.unwrap_or("base")),
        pricing_phases: vec![phase(formatted, 4_990_000, "P1M")],
    }
}

#[must_use]
pub fn subscription(id: &str, offers: Vec<SubscriptionOffer>) -> Product {
    Product {
        product_id: ProductId::new(id),
        kind: ProductKind::Subscription,
        title: id.to_string(),
        description: String::new(),
        one_time_offer: None,
        subscription_offers: offers,
    }
}

#[must_use]
pub fn one_time(id: &str, formatted: &str) -> Product {
    Product {
        product_id: ProductId::new(id),
        kind: ProductKind::OneTime,
        title: id.to_string(),
        description: String::new(),
        one_time_offer: Some(OneTimeOffer {
            price: Price::new(formatted, 990_000, "USD"),
        }),
        subscription_offers: vec![],
    }
}

/// `basic` (plan `basic`, offer `trial`), `premium` (plans `monthly`,
/// `yearly`), `coins_100` and `remove_ads`.
#[must_use]
pub fn catalog() -> Vec<Product> {
    vec![
        subscription(
            "basic",
            vec![
                monthly_offer("basic", None, "$4.99"),
                monthly_offer("basic", Some("trial"), "Free"),
            ],
        ),
        subscription(
            "premium",
            vec![
                monthly_offer("monthly", None, "$9.99"),
                monthly_offer("yearly", None, "$99.99"),
            ],
        ),
        one_time("coins_100", "$0.99"),
        one_time("remove_ads", "$2.99"),
    ]
}
