//! Catalog entries as reported by the billing service.
//!
//! A [`Product`] is either a one-time purchase with a single price, or a
//! subscription with one or more [`SubscriptionOffer`]s. Each offer belongs
//! to a base plan and may carry a promotional offer id layered on top.

use serde::{Deserialize, Serialize};

use super::key::ProductId;
use super::price::Price;

/// Billing period reported for one-time products in [`PriceInfo`].
pub const LIFETIME_PERIOD: &str = "lifetime";

/// Kind of product, as understood by the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    /// Recurring subscription with base plans and offers.
    #[serde(rename = "subs")]
    Subscription,
    /// One-time (in-app) product, possibly consumable.
    #[serde(rename = "inapp")]
    OneTime,
}

impl ProductKind {
    /// Wire name used by the billing service.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subs",
            Self::OneTime => "inapp",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subs" | "subscription" => Ok(Self::Subscription),
            "inapp" | "one_time" => Ok(Self::OneTime),
            _ => Err(format!("invalid product kind: {s}")),
        }
    }
}

/// How a pricing phase repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    /// Repeats until the subscription is cancelled.
    #[default]
    InfiniteRecurring,
    /// Repeats for `billing_cycle_count` periods.
    FiniteRecurring,
    /// Charged once (e.g. an introductory price).
    NonRecurring,
}

/// One phase of a subscription offer's price schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPhase {
    /// Price charged per billing period during this phase.
    pub price: Price,
    /// ISO 8601 billing period (e.g. `"P1M"`, `"P1Y"`).
    pub billing_period: String,
    /// Number of periods in this phase (0 for infinite).
    #[serde(default)]
    pub billing_cycle_count: u32,
    /// How the phase repeats.
    #[serde(default)]
    pub recurrence_mode: RecurrenceMode,
}

/// A purchasable offer of a subscription product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOffer {
    /// Base plan this offer belongs to.
    pub base_plan_id: String,
    /// Promotional offer id; `None` for the base plan's own entry.
    #[serde(default)]
    pub offer_id: Option<String>,
    /// Opaque token passed back to the billing service to launch this offer.
    pub offer_token: String,
    /// Price schedule, first phase first.
    #[serde(default)]
    pub pricing_phases: Vec<PricingPhase>,
}

impl SubscriptionOffer {
    /// Returns `true` if this offer matches a base plan and offer key.
    ///
    /// An empty (or whitespace) offer key selects the base plan's offer-less
    /// entry; any other key must equal the offer id exactly.
    #[must_use]
    pub fn matches(&self, base_plan_id: &str, offer_key: &str) -> bool {
        if self.base_plan_id != base_plan_id {
            return false;
        }
        let offer_key = offer_key.trim();
        if offer_key.is_empty() {
            self.offer_id.is_none()
        } else {
            self.offer_id.as_deref() == Some(offer_key)
        }
    }

    /// The first pricing phase, which is what hosts display.
    #[must_use]
    pub fn first_phase(&self) -> Option<&PricingPhase> {
        self.pricing_phases.first()
    }
}

/// Price of a one-time product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeOffer {
    /// Price of the product.
    pub price: Price,
}

/// A product fetched from the billing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub product_id: ProductId,
    /// Product kind; together with `product_id` the natural key.
    pub kind: ProductKind,
    /// Display title.
    pub title: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Price for one-time products.
    #[serde(default)]
    pub one_time_offer: Option<OneTimeOffer>,
    /// Offers for subscription products.
    #[serde(default)]
    pub subscription_offers: Vec<SubscriptionOffer>,
}

impl Product {
    /// Returns `true` if any offer of this product belongs to `base_plan_id`.
    #[must_use]
    pub fn has_base_plan(&self, base_plan_id: &str) -> bool {
        self.subscription_offers
            .iter()
            .any(|offer| offer.base_plan_id == base_plan_id)
    }

    /// Find the offer matching a base plan and offer key.
    #[must_use]
    pub fn find_offer(&self, base_plan_id: &str, offer_key: &str) -> Option<&SubscriptionOffer> {
        self.subscription_offers
            .iter()
            .find(|offer| offer.matches(base_plan_id, offer_key))
    }

    /// Flattened price view for a single subscription offer.
    #[must_use]
    pub fn subscription_price_info(&self, offer: &SubscriptionOffer) -> Option<PriceInfo> {
        let phase = offer.first_phase()?;
        Some(PriceInfo {
            product_id: self.product_id.clone(),
            kind: self.kind,
            base_plan_id: Some(offer.base_plan_id.clone()),
            offer_id: offer.offer_id.clone(),
            title: self.title.clone(),
            billing_period: phase.billing_period.clone(),
            formatted_price: phase.price.formatted.clone(),
        })
    }

    /// Flattened price view for a one-time product.
    #[must_use]
    pub fn one_time_price_info(&self) -> Option<PriceInfo> {
        let offer = self.one_time_offer.as_ref()?;
        Some(PriceInfo {
            product_id: self.product_id.clone(),
            kind: self.kind,
            base_plan_id: None,
            offer_id: None,
            title: self.title.clone(),
            billing_period: LIFETIME_PERIOD.to_owned(),
            formatted_price: offer.price.formatted.clone(),
        })
    }

    /// Every price this product can be bought at.
    ///
    /// One entry for a one-time product, one entry per offer for a
    /// subscription. Offers without pricing phases are skipped.
    #[must_use]
    pub fn price_infos(&self) -> Vec<PriceInfo> {
        match self.kind {
            ProductKind::OneTime => self.one_time_price_info().into_iter().collect(),
            ProductKind::Subscription => self
                .subscription_offers
                .iter()
                .filter_map(|offer| self.subscription_price_info(offer))
                .collect(),
        }
    }
}

/// Flattened price view handed to the host for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInfo {
    /// Product identifier.
    pub product_id: ProductId,
    /// Product kind.
    pub kind: ProductKind,
    /// Base plan id (subscriptions only).
    pub base_plan_id: Option<String>,
    /// Offer id (subscription offers only).
    pub offer_id: Option<String>,
    /// Display title of the product.
    pub title: String,
    /// ISO 8601 billing period, or [`LIFETIME_PERIOD`] for one-time products.
    pub billing_period: String,
    /// Display price.
    pub formatted_price: String,
}
