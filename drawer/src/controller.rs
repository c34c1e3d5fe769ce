use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::alert::AlertSink;
use crate::config::DrawerConfig;
use crate::metrics_defs::{
    DRAWER_OPEN, MUTATION_APPLIED, MUTATION_DROPPED_BUSY, MUTATION_FAILED, SUBMIT_ACCEPTED,
    SUBMIT_DROPPED_LOCKED,
};
use crate::upsell::UpsellSelector;
use crate::view::{CartLine, DrawerView};
use shared::{counter, gauge};
use storefront::client::{CartApiError, CartClient};
use storefront::routes::Routes;

const CART_LOAD_FAILED: &str = "Could not load the cart.";
const UPDATE_FAILED: &str = "Could not update the cart.";
const ADD_FAILED: &str = "Could not add the product to the cart.";

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("invalid cart routes: {0}")]
    Routes(#[from] storefront::routes::RouteError),
    #[error("could not build cart client: {0}")]
    Client(#[from] CartApiError),
}

/// How a mutation addresses its cart row.
#[derive(Clone, Debug, PartialEq)]
pub enum LineAddress {
    /// Stable line key, served by the keyed update endpoint.
    Key(String),
    /// 1-based row index, served by the positional change endpoint.
    Position(u32),
}

/// One desired cart change: which row, and the exact quantity it should end
/// up with. Quantity 0 removes the row.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationRequest {
    pub address: LineAddress,
    pub quantity: u32,
}

struct ControllerInner {
    client: CartClient,
    alerts: Arc<dyn AlertSink>,
    view: RwLock<DrawerView>,
    selector: RwLock<UpsellSelector>,
    /// Single permit; holding it is the "a mutation is in flight" flag.
    mutation_gate: Arc<Semaphore>,
    /// Single permit; holding it is the add-to-cart submission lock.
    submit_gate: Arc<Semaphore>,
    drawer_section: String,
    bubble_section: String,
    submit_release: Duration,
}

/// Drives one cart drawer against one storefront. Clones share state, so a
/// host can hand the controller to its event handlers freely.
#[derive(Clone)]
pub struct DrawerController {
    inner: Arc<ControllerInner>,
}

impl DrawerController {
    pub fn new(config: &DrawerConfig, alerts: Arc<dyn AlertSink>) -> Result<Self, SetupError> {
        Self::build(config, alerts, UpsellSelector::new())
    }

    /// Controller with a deterministic upsell draw, for tests.
    pub fn with_upsell_seed(
        config: &DrawerConfig,
        alerts: Arc<dyn AlertSink>,
        seed: u64,
    ) -> Result<Self, SetupError> {
        Self::build(config, alerts, UpsellSelector::with_seed(seed))
    }

    fn build(
        config: &DrawerConfig,
        alerts: Arc<dyn AlertSink>,
        selector: UpsellSelector,
    ) -> Result<Self, SetupError> {
        let routes = Routes::resolve(&config.storefront.base_url, &config.storefront.routes)?;
        let client = CartClient::new(routes, config.storefront.retry.policy())?;
        Ok(DrawerController {
            inner: Arc::new(ControllerInner {
                client,
                alerts,
                view: RwLock::new(DrawerView::new(config.elements.clone())),
                selector: RwLock::new(selector),
                mutation_gate: Arc::new(Semaphore::new(1)),
                submit_gate: Arc::new(Semaphore::new(1)),
                drawer_section: config.sections.drawer.clone(),
                bubble_section: config.sections.bubble.clone(),
                submit_release: config.timing.submit_release(),
            }),
        })
    }

    /// First sync against the storefront: loads the drawer section, then
    /// probes once for a bubble. Storefronts without a bubble skip its
    /// refresh from then on.
    pub async fn bootstrap(&self) {
        if let Err(err) = self.refresh_drawer().await {
            self.alert_failure(&err, CART_LOAD_FAILED);
        }
        match self
            .inner
            .client
            .fetch_section(&self.inner.bubble_section)
            .await
        {
            Ok(fragment) => {
                self.inner.view.write().patch_bubble(&fragment);
            }
            Err(err) => {
                tracing::debug!(error = %err, "no cart bubble on this storefront");
            }
        }
    }

    /// Current render state, cloned out. Hosts draw from this.
    pub fn snapshot(&self) -> DrawerView {
        self.inner.view.read().clone()
    }

    /// True while a cart mutation holds the gate.
    pub fn is_busy(&self) -> bool {
        self.inner.mutation_gate.available_permits() == 0
    }

    /// True while the add-to-cart lock is held, trailing window included.
    pub fn is_submit_locked(&self) -> bool {
        self.inner.submit_gate.available_permits() == 0
    }

    /// Opens the drawer as it stands, without refreshing or rerolling.
    /// No-op until a drawer fragment has been seen.
    pub fn open(&self) {
        if self.inner.view.write().set_open(true) {
            gauge!(DRAWER_OPEN).set(1.0);
        }
    }

    /// Closes the drawer. Idempotent.
    pub fn close(&self) {
        if self.inner.view.write().set_open(false) {
            gauge!(DRAWER_OPEN).set(0.0);
        }
    }

    /// The "user opened the cart" path: refresh the drawer, reroll the
    /// upsell, then open. This is the only path that rerolls; on a failed
    /// refresh the drawer stays closed and the failure is alerted.
    pub async fn open_fresh(&self) {
        match self.refresh_drawer().await {
            Ok(()) => {
                self.render_upsell(true);
                self.open();
            }
            Err(err) => self.alert_failure(&err, CART_LOAD_FAILED),
        }
    }

    /// Applies one cart mutation. Mutations are serialized by a
    /// single-permit gate: a request arriving while another is in flight is
    /// dropped outright, never queued. On success the drawer and bubble are
    /// re-synced and the pinned upsell re-rendered; failures are alerted.
    /// The gate is released on every path.
    pub async fn apply_mutation(&self, request: MutationRequest) {
        let Ok(_permit) = self.inner.mutation_gate.clone().try_acquire_owned() else {
            counter!(MUTATION_DROPPED_BUSY).increment(1);
            tracing::debug!(?request, "mutation dropped, another is in flight");
            return;
        };
        match self.perform_mutation(&request).await {
            Ok(()) => counter!(MUTATION_APPLIED).increment(1),
            Err(err) => {
                counter!(MUTATION_FAILED).increment(1);
                self.alert_failure(&err, UPDATE_FAILED);
            }
        }
    }

    async fn perform_mutation(&self, request: &MutationRequest) -> Result<(), CartApiError> {
        match &request.address {
            LineAddress::Key(key) => {
                self.inner.client.update_line(key, request.quantity).await?;
            }
            LineAddress::Position(line) => {
                self.inner
                    .client
                    .change_line(*line, request.quantity)
                    .await?;
            }
        }
        self.refresh_drawer().await?;
        self.refresh_bubble_if_present().await;
        self.render_upsell(false);
        Ok(())
    }

    /// Steps a row's quantity up by its step size, capped at its max.
    pub async fn increment_line(&self, line: u32) {
        self.mutate_line(line, CartLine::incremented).await;
    }

    /// Steps a row's quantity down, floored at its min.
    pub async fn decrement_line(&self, line: u32) {
        self.mutate_line(line, CartLine::decremented).await;
    }

    /// Sets a row to a requested quantity, clamped into its bounds.
    pub async fn set_line_quantity(&self, line: u32, requested: u32) {
        self.mutate_line(line, move |row| row.clamped(requested)).await;
    }

    /// Removes a row: sends quantity 0 directly, skipping the min clamp.
    pub async fn remove_line(&self, line: u32) {
        self.mutate_line(line, |_| 0).await;
    }

    async fn mutate_line(&self, line: u32, quantity_for: impl FnOnce(&CartLine) -> u32) {
        let request = {
            let view = self.inner.view.read();
            view.line(line).map(|row| MutationRequest {
                address: match &row.key {
                    Some(key) => LineAddress::Key(key.clone()),
                    None => LineAddress::Position(line),
                },
                quantity: quantity_for(row),
            })
        };
        match request {
            Some(request) => self.apply_mutation(request).await,
            None => tracing::debug!(line, "no such cart line, ignoring"),
        }
    }

    /// Product-form submission. Duplicates are dropped while the lock is
    /// held, and the lock lingers for the configured window past completion
    /// to absorb trailing duplicate events. Success refreshes the bubble
    /// and reopens the drawer fresh, which rerolls the upsell.
    pub async fn add_to_cart(&self, variant_id: u64, quantity: u32) {
        let Ok(permit) = self.inner.submit_gate.clone().try_acquire_owned() else {
            counter!(SUBMIT_DROPPED_LOCKED).increment(1);
            tracing::debug!(variant_id, "add to cart dropped, submission lock held");
            return;
        };
        self.inner.view.write().set_submit_busy(true);

        match self.inner.client.add_item(variant_id, quantity).await {
            Ok(()) => {
                counter!(SUBMIT_ACCEPTED).increment(1);
                self.refresh_bubble_if_present().await;
                self.open_fresh().await;
            }
            Err(err) => self.alert_failure(&err, ADD_FAILED),
        }

        self.inner.view.write().set_submit_busy(false);
        release_later(permit, self.inner.submit_release);
    }

    /// Adds the rendered upsell (quantity 1) under the same submission
    /// lock. Keeps the pinned pick and opens without rerolling.
    pub async fn add_upsell(&self) {
        let Some(variant_id) = self.inner.view.read().upsell().map(|u| u.add_variant_id) else {
            tracing::debug!("no upsell rendered, ignoring add");
            return;
        };
        let Ok(permit) = self.inner.submit_gate.clone().try_acquire_owned() else {
            counter!(SUBMIT_DROPPED_LOCKED).increment(1);
            tracing::debug!(variant_id, "upsell add dropped, submission lock held");
            return;
        };
        self.inner.view.write().set_upsell_busy(true);

        match self.inner.client.add_item(variant_id, 1).await {
            Ok(()) => {
                counter!(SUBMIT_ACCEPTED).increment(1);
                match self.refresh_drawer().await {
                    Ok(()) => {
                        self.refresh_bubble_if_present().await;
                        self.render_upsell(false);
                        self.open();
                    }
                    Err(err) => self.alert_failure(&err, CART_LOAD_FAILED),
                }
            }
            Err(err) => self.alert_failure(&err, ADD_FAILED),
        }

        self.inner.view.write().set_upsell_busy(false);
        release_later(permit, self.inner.submit_release);
    }

    async fn refresh_drawer(&self) -> Result<(), CartApiError> {
        let fragment = self
            .inner
            .client
            .fetch_section(&self.inner.drawer_section)
            .await?;
        if !self.inner.view.write().patch_drawer(&fragment) {
            tracing::debug!(
                section = %self.inner.drawer_section,
                "fragment carried no drawer container"
            );
        }
        Ok(())
    }

    /// Bubble refresh is best effort, and only for storefronts that have
    /// one.
    async fn refresh_bubble_if_present(&self) {
        if !self.inner.view.read().has_bubble() {
            return;
        }
        match self
            .inner
            .client
            .fetch_section(&self.inner.bubble_section)
            .await
        {
            Ok(fragment) => {
                self.inner.view.write().patch_bubble(&fragment);
            }
            Err(err) => {
                tracing::debug!(error = %err, "cart bubble refresh failed");
            }
        }
    }

    /// Runs one upsell render cycle against the current drawer markup.
    fn render_upsell(&self, randomize: bool) {
        let pool = self.inner.view.read().upsell_pool();
        let pick = self
            .inner
            .selector
            .write()
            .select(&pool, randomize)
            .cloned();
        if let Some(pick) = pick {
            self.inner.view.write().render_upsell(&pick);
        }
    }

    /// Failures stop at this boundary: logged, then surfaced as an alert.
    /// Server-provided text wins over the generic fallback.
    fn alert_failure(&self, err: &CartApiError, fallback: &str) {
        tracing::error!(error = %err, "cart operation failed");
        let message = match err {
            CartApiError::Rejected {
                message: Some(server_message),
                ..
            } => server_message.clone(),
            _ => fallback.to_string(),
        };
        self.inner.alerts.alert(&message);
    }
}

/// Hands the permit to a timer task so the lock outlives the submission by
/// the configured window.
fn release_later(permit: OwnedSemaphorePermit, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        drop(permit);
    });
}
