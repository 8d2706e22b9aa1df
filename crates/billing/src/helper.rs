//! The coordinator the host application talks to.
//!
//! [`PremiumHelper`] owns the catalog, the ledger and the connection state,
//! drives the billing client, and reports to the registered listeners.
//!
//! # Lifecycle
//!
//! 1. Build with [`PremiumHelper::builder`] and register listeners.
//! 2. [`PremiumHelper::initialize`] connects, then fetches the subscription
//!    catalog, the one-time catalog and the active purchases concurrently.
//!    Readiness is signalled once all three resolve, or as
//!    [`Readiness::Degraded`] when they exceed the configured ready timeout.
//! 3. Purchase flows and entitlement checks.
//! 4. [`PremiumHelper::release`] ends the connection.
//!
//! Failures are never returned as panics or raw service errors: every one is
//! mapped to a [`BillingErrorKind`] and delivered through
//! [`PurchaseEventListener::on_billing_error`].

use std::sync::{Arc, PoisonError, Weak};

use premium_core::{
    BillingErrorKind, Feature, PriceInfo, Product, ProductId, ProductKind, Purchase,
    ReplacementMode, ResponseCode,
};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, instrument, warn};
use url::Url;

use crate::client::{BillingClient, BillingFlowParams, ClientEvent, SubscriptionUpdate};
use crate::config::{BillingConfig, ConfigError};
use crate::connection::{ConnectionEvent, ConnectionState};
use crate::error::BillingResponse;
use crate::listener::{ClientListener, Listeners, PurchaseEventListener, Readiness};
use crate::pipeline::{ReconcileReport, Reconciler};
use crate::state::BillingState;

/// Base URL of the store's subscription management page.
const SUBSCRIPTION_CENTER_URL: &str = "https://play.google.com/store/account/subscriptions";

/// Result of [`PremiumHelper::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Connected; readiness was signalled.
    Ready(Readiness),
    /// The coordinator was already initialized; nothing was done.
    AlreadyConnected,
    /// Setup failed; the host was sent `on_client_init_error`.
    Failed(BillingResponse),
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`PremiumHelper`].
pub struct PremiumHelperBuilder {
    config: BillingConfig,
    client: Arc<dyn BillingClient>,
    listeners: Listeners,
}

impl PremiumHelperBuilder {
    /// Register the connection lifecycle listener.
    #[must_use]
    pub fn client_listener(mut self, listener: Arc<dyn ClientListener>) -> Self {
        self.listeners.client = listener;
        self
    }

    /// Register the purchase and error listener.
    #[must_use]
    pub fn event_listener(mut self, listener: Arc<dyn PurchaseEventListener>) -> Self {
        self.listeners.events = listener;
        self
    }

    /// Validate the configuration and build the coordinator.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn build(self) -> Result<PremiumHelper, ConfigError> {
        self.config.validate()?;
        let refresh = Arc::new(RefreshTasks::default());
        Ok(PremiumHelper {
            inner: Arc::new(PremiumHelperInner {
                config: self.config,
                client: self.client,
                listeners: self.listeners,
                state: RwLock::new(BillingState::default()),
                event_loop: Mutex::new(None),
                refresh: Arc::clone(&refresh),
            }),
            _refresh_guard: Arc::new(RefreshGuard(refresh)),
        })
    }
}

// =============================================================================
// PremiumHelper
// =============================================================================

/// Billing coordinator.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct PremiumHelper {
    inner: Arc<PremiumHelperInner>,
    _refresh_guard: Arc<RefreshGuard>,
}

struct PremiumHelperInner {
    config: BillingConfig,
    client: Arc<dyn BillingClient>,
    listeners: Listeners,
    state: RwLock<BillingState>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    refresh: Arc<RefreshTasks>,
}

/// Post-connect fetches and reconnect refreshes running in the background.
#[derive(Debug, Default)]
struct RefreshTasks {
    handles: std::sync::Mutex<Vec<AbortHandle>>,
}

impl RefreshTasks {
    fn track(&self, handle: AbortHandle) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    fn abort_all(&self) {
        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            handle.abort();
        }
    }
}

/// Aborts background refreshes when the last host handle is dropped.
///
/// Refresh tasks keep `PremiumHelperInner` alive, so its own `Drop` cannot
/// be relied on to stop them.
#[derive(Debug)]
struct RefreshGuard(Arc<RefreshTasks>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.abort_all();
    }
}

impl Drop for PremiumHelperInner {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for PremiumHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiumHelper")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl PremiumHelper {
    /// Start building a coordinator around `client`.
    #[must_use]
    pub fn builder(config: BillingConfig, client: Arc<dyn BillingClient>) -> PremiumHelperBuilder {
        PremiumHelperBuilder {
            config,
            client,
            listeners: Listeners::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BillingConfig {
        &self.inner.config
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Connect to the billing service and load catalogs and purchases.
    ///
    /// Calling this on an initialized coordinator only notifies
    /// `on_client_already_connected`.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> InitOutcome {
        let inner = &self.inner;
        {
            let mut state = inner.state.write().await;
            if state.initialized {
                drop(state);
                premium_log!(inner.config.logging, "Billing client already connected");
                inner.listeners.client.on_client_already_connected();
                return InitOutcome::AlreadyConnected;
            }
            state.initialized = true;
            state.transition(ConnectionEvent::StartConnect);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_event_loop(Arc::downgrade(inner), events_rx));
        if let Some(previous) = inner.event_loop.lock().await.replace(handle) {
            previous.abort();
        }

        premium_log!(inner.config.logging, "Connecting to billing service");
        match inner.client.start_connection(events_tx).await {
            Ok(()) => {
                inner
                    .state
                    .write()
                    .await
                    .transition(ConnectionEvent::SetupSucceeded);
                premium_log!(inner.config.logging, "Billing setup finished");
                let readiness = inner.refresh_after_connect().await;
                inner.listeners.client.on_client_ready(readiness);
                InitOutcome::Ready(readiness)
            }
            Err(response) => {
                {
                    let mut state = inner.state.write().await;
                    state.transition(ConnectionEvent::SetupFailed);
                    state.initialized = false;
                }
                if let Some(handle) = inner.event_loop.lock().await.take() {
                    handle.abort();
                }
                error!(error = %response, "Billing setup failed");
                inner.listeners.client.on_client_init_error(&response);
                InitOutcome::Failed(response)
            }
        }
    }

    /// End the connection. Catalog and ledger contents are kept.
    #[instrument(skip(self))]
    pub async fn release(&self) {
        let inner = &self.inner;
        inner.refresh.abort_all();
        inner.client.end_connection().await;
        {
            let mut state = inner.state.write().await;
            state.transition(ConnectionEvent::Release);
            state.initialized = false;
        }
        if let Some(handle) = inner.event_loop.lock().await.take() {
            handle.abort();
        }
        premium_log!(inner.config.logging, "Billing client released");
    }

    /// Returns `true` when the channel is ready on both sides.
    pub async fn is_client_ready(&self) -> bool {
        self.inner.state.read().await.connection.is_ready() && self.inner.client.is_ready()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.state.read().await.connection.state()
    }

    /// Re-query owned purchases and reconcile them.
    ///
    /// # Errors
    ///
    /// Returns the reported error kind when the client is not ready.
    pub async fn fetch_active_purchases(&self) -> Result<ReconcileReport, BillingErrorKind> {
        self.inner.ensure_ready().await?;
        Ok(self.inner.fetch_active_purchases().await)
    }

    // -------------------------------------------------------------------------
    // Purchase flows
    // -------------------------------------------------------------------------

    /// Launch the purchase flow for a subscription base plan and offer.
    ///
    /// An empty `offer_key` selects the base plan's own offer.
    ///
    /// # Errors
    ///
    /// Returns the reported error kind; the same kind was sent to
    /// `on_billing_error`.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, base_plan_id: &str, offer_key: &str) -> Result<(), BillingErrorKind> {
        let inner = &self.inner;
        inner.ensure_ready().await?;
        let (product_id, offer_token) = inner.resolve_offer(base_plan_id, offer_key).await?;
        inner
            .launch(BillingFlowParams {
                product_id,
                kind: ProductKind::Subscription,
                offer_token: Some(offer_token),
                is_offer_personalized: false,
                subscription_update: None,
            })
            .await
    }

    /// Replace the subscription held on `old_base_plan_id` with a new base
    /// plan and offer.
    ///
    /// # Errors
    ///
    /// Returns the reported error kind, including
    /// `OldPurchaseTokenNotFound` when nothing is held on the old plan.
    #[instrument(skip(self))]
    pub async fn upgrade_or_downgrade_subscription(
        &self,
        new_base_plan_id: &str,
        new_offer_key: &str,
        old_base_plan_id: &str,
        replacement_mode: ReplacementMode,
    ) -> Result<(), BillingErrorKind> {
        let inner = &self.inner;
        inner.ensure_ready().await?;
        let (product_id, offer_token) = inner.resolve_offer(new_base_plan_id, new_offer_key).await?;

        let old_purchase_token = inner
            .state
            .read()
            .await
            .entitlements()
            .old_purchase_token(old_base_plan_id)
            .cloned();
        let Some(old_purchase_token) = old_purchase_token else {
            warn!(old_base_plan_id, "No subscription held on the plan being replaced");
            return Err(inner.report(BillingErrorKind::OldPurchaseTokenNotFound));
        };

        inner
            .launch(BillingFlowParams {
                product_id,
                kind: ProductKind::Subscription,
                offer_token: Some(offer_token),
                is_offer_personalized: false,
                subscription_update: Some(SubscriptionUpdate {
                    old_purchase_token,
                    replacement_mode,
                }),
            })
            .await
    }

    /// Launch the purchase flow for a one-time product.
    ///
    /// # Errors
    ///
    /// Returns the reported error kind. `InvalidProductTypeSet` means the id
    /// names a subscription.
    #[instrument(skip(self))]
    pub async fn buy_one_time(
        &self,
        product_id: &str,
        is_offer_personalized: bool,
    ) -> Result<(), BillingErrorKind> {
        let inner = &self.inner;
        inner.ensure_ready().await?;

        let resolved = {
            let state = inner.state.read().await;
            match state.catalog.lookup_by_identifier(product_id, ProductKind::OneTime) {
                Some(product) => Ok(product.product_id.clone()),
                None if state.catalog.product_kind_of(product_id)
                    == Some(ProductKind::Subscription) =>
                {
                    Err(BillingErrorKind::InvalidProductTypeSet)
                }
                None => Err(BillingErrorKind::ProductNotExist),
            }
        };
        let product_id = resolved.map_err(|kind| inner.report(kind))?;

        inner
            .launch(BillingFlowParams {
                product_id,
                kind: ProductKind::OneTime,
                offer_token: None,
                is_offer_personalized,
                subscription_update: None,
            })
            .await
    }

    /// Whether the device supports subscriptions.
    ///
    /// Reports `BillingUnavailable` when the channel is not ready.
    pub async fn are_subscriptions_supported(&self) -> bool {
        let inner = &self.inner;
        if !inner.state.read().await.connection.is_ready() {
            inner.report(BillingErrorKind::BillingUnavailable);
            return false;
        }
        let code = inner.client.is_feature_supported(Feature::Subscriptions);
        if !code.is_ok() {
            premium_log!(inner.config.logging, %code, "Subscriptions not supported");
        }
        code.is_ok()
    }

    /// Deep link to the store page where the user manages (and cancels) a
    /// subscription.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the link cannot be built.
    pub fn subscription_management_url(
        package_name: &str,
        product_id: &ProductId,
    ) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            SUBSCRIPTION_CENTER_URL,
            &[("package", package_name), ("sku", product_id.as_str())],
        )
    }

    // -------------------------------------------------------------------------
    // Catalog queries
    // -------------------------------------------------------------------------

    /// Product of `kind` matching `key`.
    ///
    /// Reports `ProductNotExist` and returns `None` when nothing matches.
    pub async fn product_detail(&self, key: &str, kind: ProductKind) -> Option<Product> {
        let found = self
            .inner
            .state
            .read()
            .await
            .catalog
            .lookup_by_identifier(key, kind)
            .cloned();
        if found.is_none() {
            self.inner.report(BillingErrorKind::ProductNotExist);
        }
        found
    }

    /// Price of a subscription base plan and offer.
    ///
    /// Reports `ProductNotExist` or `OfferNotExist` and returns `None` when
    /// nothing matches.
    pub async fn subscription_price(&self, base_plan_id: &str, offer_key: &str) -> Option<PriceInfo> {
        let result = {
            let state = self.inner.state.read().await;
            match state.catalog.lookup_by_base_plan_and_offer(base_plan_id, offer_key) {
                Some(info) => Ok(info),
                None if state.catalog.subscription_product_for_base_plan(base_plan_id).is_none() => {
                    Err(BillingErrorKind::ProductNotExist)
                }
                None => Err(BillingErrorKind::OfferNotExist),
            }
        };
        result.map_err(|kind| self.inner.report(kind)).ok()
    }

    /// Offer token for a base plan and offer key.
    pub async fn offer_token(&self, base_plan_id: &str, offer_key: &str) -> Option<String> {
        self.inner
            .resolve_offer(base_plan_id, offer_key)
            .await
            .ok()
            .map(|(_, token)| token)
    }

    /// Price of a one-time product.
    pub async fn one_time_price(&self, product_id: &str) -> Option<PriceInfo> {
        let found = self.inner.state.read().await.catalog.one_time_price(product_id);
        if found.is_none() {
            self.inner.report(BillingErrorKind::ProductNotExist);
        }
        found
    }

    /// Every price in the catalog, duplicates included.
    pub async fn all_product_prices(&self) -> Vec<PriceInfo> {
        self.inner.state.read().await.catalog.all_prices()
    }

    /// Snapshot of the catalog.
    pub async fn products(&self) -> Vec<Product> {
        self.inner.state.read().await.catalog.products().to_vec()
    }

    /// Snapshot of the ledger bucket for `kind`.
    pub async fn active_purchases(&self, kind: ProductKind) -> Vec<Purchase> {
        self.inner.state.read().await.ledger.bucket(kind).to_vec()
    }

    // -------------------------------------------------------------------------
    // Entitlements
    // -------------------------------------------------------------------------

    pub async fn has_any_active_subscription(&self) -> bool {
        self.inner
            .state
            .read()
            .await
            .entitlements()
            .has_any_active_subscription()
    }

    /// Reports `ProductNotExist` when no subscription covers the base plan.
    pub async fn has_active_subscription_for_base_plan(&self, base_plan_id: &str) -> bool {
        let active = self
            .inner
            .state
            .read()
            .await
            .entitlements()
            .has_active_subscription_for_base_plan(base_plan_id);
        if !active {
            self.inner.report(BillingErrorKind::ProductNotExist);
        }
        active
    }

    pub async fn has_active_subscription_for_product(&self, product_id: &str) -> bool {
        self.inner
            .state
            .read()
            .await
            .entitlements()
            .has_active_subscription_for_product(product_id)
    }

    pub async fn has_active_one_time_purchase(&self) -> bool {
        self.inner
            .state
            .read()
            .await
            .entitlements()
            .has_active_one_time_purchase()
    }

    pub async fn has_active_one_time_purchase_for_product(&self, product_id: &str) -> bool {
        self.inner
            .state
            .read()
            .await
            .entitlements()
            .has_active_one_time_purchase_for_product(product_id)
    }
}

// =============================================================================
// Internals
// =============================================================================

impl PremiumHelperInner {
    fn report(&self, kind: BillingErrorKind) -> BillingErrorKind {
        self.listeners.events.on_billing_error(kind);
        kind
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler {
            client: self.client.as_ref(),
            config: &self.config,
            state: &self.state,
            listeners: &self.listeners,
        }
    }

    /// Flows need a ready channel.
    async fn ensure_ready(&self) -> Result<(), BillingErrorKind> {
        let (connection, initialized) = {
            let state = self.state.read().await;
            (state.connection.state(), state.initialized)
        };
        let kind = match connection {
            ConnectionState::Ready => return Ok(()),
            ConnectionState::Connecting => BillingErrorKind::ClientNotReady,
            ConnectionState::Disconnected if initialized => BillingErrorKind::ServiceDisconnected,
            ConnectionState::Disconnected => BillingErrorKind::ClientDisconnected,
        };
        warn!(%connection, ?kind, "Billing client is not ready");
        Err(self.report(kind))
    }

    /// Subscription product id and offer token for a base plan and offer.
    async fn resolve_offer(
        &self,
        base_plan_id: &str,
        offer_key: &str,
    ) -> Result<(ProductId, String), BillingErrorKind> {
        let resolved = {
            let state = self.state.read().await;
            match state.catalog.subscription_product_for_base_plan(base_plan_id) {
                None => Err(BillingErrorKind::ProductNotExist),
                Some(_) => state
                    .catalog
                    .find_subscription_offer(base_plan_id, offer_key)
                    .map(|(product, offer)| (product.product_id.clone(), offer.offer_token.clone()))
                    .ok_or(BillingErrorKind::OfferNotExist),
            }
        };
        resolved.map_err(|kind| {
            warn!(base_plan_id, offer_key, ?kind, "Could not resolve subscription offer");
            self.report(kind)
        })
    }

    async fn launch(&self, params: BillingFlowParams) -> Result<(), BillingErrorKind> {
        premium_log!(
            self.config.logging,
            product_id = %params.product_id,
            kind = %params.kind,
            "Launching billing flow"
        );
        self.client.launch_billing_flow(&params).await.map_err(|response| {
            warn!(error = %response, "Billing flow failed to launch");
            self.report(response.error_kind())
        })
    }

    /// Run the three post-connect fetches, bounded by the ready timeout.
    ///
    /// On timeout the fetches keep running in the background and
    /// `on_purchases_updated` fires once they complete, unless the
    /// coordinator is released first.
    async fn refresh_after_connect(self: &Arc<Self>) -> Readiness {
        let this = Arc::clone(self);
        let mut fetches = tokio::spawn(async move { this.fetch_all().await });
        self.refresh.track(fetches.abort_handle());

        match tokio::time::timeout(self.config.ready_timeout, &mut fetches).await {
            Ok(Ok(())) => Readiness::Complete,
            Ok(Err(e)) if e.is_cancelled() => {
                premium_log!(self.config.logging, "Initial fetches cancelled by release");
                Readiness::Degraded
            }
            Ok(Err(e)) => {
                error!(error = %e, "Initial fetch task failed");
                Readiness::Complete
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.ready_timeout.as_secs_f64(),
                    "Initial fetches exceeded the ready timeout; signalling degraded readiness"
                );
                let this = Arc::clone(self);
                let late = tokio::spawn(async move {
                    if fetches.await.is_ok() && this.state.read().await.initialized {
                        premium_log!(this.config.logging, "Late initial fetches finished");
                        this.listeners.client.on_purchases_updated();
                    }
                });
                self.refresh.track(late.abort_handle());
                Readiness::Degraded
            }
        }
    }

    async fn fetch_all(&self) {
        tokio::join!(
            self.fetch_products(ProductKind::Subscription),
            self.fetch_products(ProductKind::OneTime),
            self.fetch_active_purchases(),
        );
    }

    /// Fetch configured products of `kind` into the catalog.
    ///
    /// Failures are logged and resolve as an empty result.
    async fn fetch_products(&self, kind: ProductKind) {
        let keys = self.config.keys_for(kind);
        if keys.is_empty() {
            return;
        }
        match self.client.query_product_details(keys, kind).await {
            Ok(products) => {
                premium_log!(self.config.logging, %kind, count = products.len(), "Fetched products");
                self.state.write().await.catalog.extend(products);
            }
            Err(response) => {
                warn!(%kind, error = %response, "Product query failed; continuing without it");
            }
        }
    }

    /// Query owned purchases of both kinds and reconcile them.
    async fn fetch_active_purchases(&self) -> ReconcileReport {
        let (subscriptions, one_time) = tokio::join!(
            self.query_purchases(ProductKind::Subscription),
            self.query_purchases(ProductKind::OneTime),
        );
        let purchases: Vec<Purchase> = subscriptions.into_iter().chain(one_time).collect();

        if purchases.is_empty() {
            premium_log!(self.config.logging, "No active purchases");
            self.listeners.client.on_purchases_updated();
            return ReconcileReport::default();
        }
        self.reconciler().reconcile(&purchases).await
    }

    async fn query_purchases(&self, kind: ProductKind) -> Vec<Purchase> {
        match self.client.query_purchases(kind).await {
            Ok(purchases) => purchases,
            Err(response) => {
                warn!(%kind, error = %response, "Purchase query failed; continuing without it");
                Vec::new()
            }
        }
    }

    async fn handle_event(self: &Arc<Self>, event: ClientEvent) {
        match event {
            ClientEvent::PurchasesUpdated(Ok(purchases)) => {
                self.reconciler().reconcile(&purchases).await;
                self.listeners.events.on_products_purchased(&purchases);
            }
            ClientEvent::PurchasesUpdated(Err(response)) => {
                if response.code == ResponseCode::UserCanceled {
                    premium_log!(self.config.logging, "Purchase flow cancelled by user");
                } else {
                    warn!(error = %response, "Purchase update failed");
                }
                self.report(response.error_kind());
            }
            ClientEvent::ServiceDisconnected => {
                self.state
                    .write()
                    .await
                    .transition(ConnectionEvent::ChannelLost);
                warn!("Billing service disconnected");
                self.listeners.client.on_client_init_error(&BillingResponse::new(
                    ResponseCode::ServiceDisconnected,
                    "billing service disconnected",
                ));
            }
            ClientEvent::ServiceReconnected => {
                {
                    let mut state = self.state.write().await;
                    if !state.initialized {
                        return;
                    }
                    state.transition(ConnectionEvent::StartConnect);
                    state.transition(ConnectionEvent::SetupSucceeded);
                }
                premium_log!(self.config.logging, "Billing service reconnected; refreshing");
                // Off the event loop, so pushes keep draining while it runs.
                let this = Arc::clone(self);
                let refresh = tokio::spawn(async move {
                    let readiness = this.refresh_after_connect().await;
                    this.listeners.client.on_client_ready(readiness);
                });
                self.refresh.track(refresh.abort_handle());
            }
        }
    }
}

/// Drain pushes from the billing client until the coordinator is dropped.
async fn run_event_loop(
    inner: Weak<PremiumHelperInner>,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_event(event).await;
    }
}
