//! Accumulated product catalog.
//!
//! Products are appended in fetch order and never replaced: fetching the same
//! ids twice leaves two copies of each product. Every lookup is a linear scan
//! and returns the first match.

use premium_core::{PriceInfo, Product, ProductKind, SubscriptionOffer};

/// Product and offer metadata fetched from the billing service.
#[derive(Debug, Clone, Default)]
pub struct CatalogCache {
    products: Vec<Product>,
}

impl CatalogCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Append a fetched batch.
    pub fn extend(&mut self, products: impl IntoIterator<Item = Product>) {
        self.products.extend(products);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Every cached product, duplicates included.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Find a product of `kind` by key.
    ///
    /// One-time products match on product id. Subscriptions match on product
    /// id or on any of their base plan ids.
    #[must_use]
    pub fn lookup_by_identifier(&self, key: &str, kind: ProductKind) -> Option<&Product> {
        self.products.iter().find(|product| {
            product.kind == kind
                && (product.product_id == *key
                    || (kind == ProductKind::Subscription && product.has_base_plan(key)))
        })
    }

    /// Find the subscription offer for a base plan and offer key.
    ///
    /// An empty offer key selects the base plan's offer-less entry.
    #[must_use]
    pub fn find_subscription_offer(
        &self,
        base_plan_id: &str,
        offer_key: &str,
    ) -> Option<(&Product, &SubscriptionOffer)> {
        self.products
            .iter()
            .filter(|product| product.kind == ProductKind::Subscription)
            .find_map(|product| {
                product
                    .find_offer(base_plan_id, offer_key)
                    .map(|offer| (product, offer))
            })
    }

    /// Price view for a base plan and offer key.
    #[must_use]
    pub fn lookup_by_base_plan_and_offer(
        &self,
        base_plan_id: &str,
        offer_key: &str,
    ) -> Option<PriceInfo> {
        let (product, offer) = self.find_subscription_offer(base_plan_id, offer_key)?;
        product.subscription_price_info(offer)
    }

    /// Offer token used to launch a subscription flow.
    #[must_use]
    pub fn offer_token(&self, base_plan_id: &str, offer_key: &str) -> Option<&str> {
        self.find_subscription_offer(base_plan_id, offer_key)
            .map(|(_, offer)| offer.offer_token.as_str())
    }

    /// Price view for a one-time product.
    #[must_use]
    pub fn one_time_price(&self, product_id: &str) -> Option<PriceInfo> {
        self.lookup_by_identifier(product_id, ProductKind::OneTime)?
            .one_time_price_info()
    }

    /// Kind of the first product whose id is `product_id`.
    ///
    /// Returns `None` when the catalog is empty or the id is unknown.
    #[must_use]
    pub fn product_kind_of(&self, product_id: &str) -> Option<ProductKind> {
        self.products
            .iter()
            .find(|product| product.product_id == *product_id)
            .map(|product| product.kind)
    }

    /// The subscription product that owns `base_plan_id`.
    #[must_use]
    pub fn subscription_product_for_base_plan(&self, base_plan_id: &str) -> Option<&Product> {
        self.products.iter().find(|product| {
            product.kind == ProductKind::Subscription && product.has_base_plan(base_plan_id)
        })
    }

    /// Every price the catalog offers, in fetch order.
    #[must_use]
    pub fn all_prices(&self) -> Vec<PriceInfo> {
        self.products.iter().flat_map(Product::price_infos).collect()
    }
}
