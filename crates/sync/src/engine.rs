//! Cart engine: the composition root tying store, persistence and remote.
//!
//! # Mutations
//!
//! Guest sessions mutate the store and write the cart through to the local
//! store. Authenticated sessions run every mutation in two phases:
//!
//! 1. **Tentative** - the action is applied to the store immediately
//! 2. **Confirm** - the remote call runs; its snapshot replaces the
//!    tentative state, unless a newer mutation or an owner change happened
//!    meanwhile (then the snapshot is stale and dropped)
//!
//! When the remote call fails, the [`FallbackPolicy`] decides whether the
//! tentative change stays or is rolled back. Either way the error is logged
//! and recorded in the store's error flag; nothing is returned as an error.

use std::future::Future;

use mercado_cart_core::{
    CartOwnerKey, CurrencyCode, PendingIntent, Product, ProductId, ShippingPolicy,
};
use tracing::{debug, instrument, warn};

use crate::config::{CartConfig, FallbackPolicy};
use crate::error::Result;
use crate::local::{self, FileStore, LocalStore};
use crate::remote::{CartRemote, HttpCartRemote, RemoteCart, RemoteError};
use crate::session::{PendingIntents, SessionId};
use crate::store::{CartAction, CartStore};
use crate::summary::CartSummary;

/// How a mutation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Applied locally only (guest session, or no remote line to address).
    Local,
    /// The remote snapshot was applied.
    Confirmed,
    /// The remote call succeeded but a newer state already exists.
    Superseded,
    /// The remote call failed; the local change was kept.
    Fallback { error: String },
    /// The remote call failed; the local change was undone.
    RolledBack { error: String },
}

/// Cart engine for one client session.
///
/// Owns the [`CartStore`]; UI code reads through [`CartEngine::summary`] or
/// [`CartStore::subscribe`] and mutates through the engine methods.
pub struct CartEngine<R, L> {
    pub(crate) store: CartStore,
    pub(crate) remote: R,
    pub(crate) local: L,
    pub(crate) intents: PendingIntents,
    pub(crate) session: SessionId,
    shipping: ShippingPolicy,
    fallback: FallbackPolicy,
}

impl CartEngine<HttpCartRemote, FileStore> {
    /// Engine talking HTTP to the configured service and persisting guest
    /// carts under the configured directory.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if the HTTP client cannot be built.
    pub fn from_config(config: &CartConfig) -> Result<Self> {
        let remote = HttpCartRemote::new(&config.remote)?;
        let local = FileStore::new(&config.storage_dir);
        Ok(Self::new(config, remote, local))
    }
}

impl<R: CartRemote, L: LocalStore> CartEngine<R, L> {
    /// Create an engine with a fresh session id.
    #[must_use]
    pub fn new(config: &CartConfig, remote: R, local: L) -> Self {
        Self::with_session(config, remote, local, SessionId::generate())
    }

    /// Create an engine for an existing session.
    #[must_use]
    pub fn with_session(config: &CartConfig, remote: R, local: L, session: SessionId) -> Self {
        Self {
            store: CartStore::new(),
            remote,
            local,
            intents: PendingIntents::new(config.pending_intent_ttl),
            session,
            shipping: config.shipping,
            fallback: config.fallback,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub const fn local(&self) -> &L {
        &self.local
    }

    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub(crate) const fn currency(&self) -> CurrencyCode {
        self.shipping.flat_fee.currency_code
    }

    /// Current owner of the cart.
    #[must_use]
    pub fn owner(&self) -> CartOwnerKey {
        self.store.state().owner
    }

    /// Derived queries over the current state.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::new(self.store.state(), self.shipping)
    }

    /// Remember that this session wanted to add a product before logging in.
    pub async fn capture_pending_intent(&self, intent: PendingIntent) {
        self.intents.capture(self.session, intent).await;
    }

    /// Add `quantity` units of `product`, clamped to stock.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item(&self, product: &Product, quantity: u32) -> MutationOutcome {
        let action = CartAction::AddItem {
            product: product.clone(),
            quantity,
        };
        let owner = self.owner();
        let Some(remote_id) = owner.remote_id() else {
            return self.apply_local(&owner, action);
        };
        // The service sums quantities without checking stock
        let existing = self.store.state().cart.item_quantity(product.id);
        let delta = stock_headroom(existing, quantity, product.stock);
        if delta == 0 {
            debug!(existing, stock = product.stock, "Nothing to add");
            return MutationOutcome::Local;
        }

        let call = self.remote.add_item(remote_id, product.id, delta);
        self.two_phase(action, call).await
    }

    /// Remove the line for `product_id`. Unknown ids are a no-op.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, product_id: ProductId) -> MutationOutcome {
        let action = CartAction::RemoveItem(product_id);
        let state = self.store.state();
        let item_id = state.cart.get(product_id).and_then(|i| i.item_id());
        let (Some(remote_id), Some(item_id)) = (state.owner.remote_id(), item_id) else {
            return self.apply_local(&state.owner, action);
        };

        let call = self.remote.remove_item(remote_id, item_id);
        self.two_phase(action, call).await
    }

    /// Set the quantity of a line, clamped to `[1, stock]`; `<= 0` removes it.
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, product_id: ProductId, quantity: i64) -> MutationOutcome {
        if quantity <= 0 {
            return self.remove_item(product_id).await;
        }

        let action = CartAction::SetQuantity {
            product_id,
            quantity,
        };
        let state = self.store.state();
        let Some(line) = state.cart.get(product_id) else {
            return MutationOutcome::Local;
        };
        let (Some(remote_id), Some(item_id)) = (state.owner.remote_id(), line.item_id()) else {
            return self.apply_local(&state.owner, action);
        };

        let clamped = u32::try_from(quantity)
            .unwrap_or(u32::MAX)
            .clamp(1, line.stock_limit().max(1));
        let call = self.remote.update_item(remote_id, item_id, clamped);
        self.two_phase(action, call).await
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> MutationOutcome {
        let owner = self.owner();
        let Some(remote_id) = owner.remote_id() else {
            return self.apply_local(&owner, CartAction::Clear);
        };

        let call = self.remote.clear_cart(remote_id);
        self.two_phase(CartAction::Clear, call).await
    }

    /// Apply an action without a remote round-trip, writing guest carts
    /// through to the local store.
    fn apply_local(&self, owner: &CartOwnerKey, action: CartAction) -> MutationOutcome {
        self.store.dispatch(action);
        if owner.is_guest() {
            self.persist_guest();
        }
        MutationOutcome::Local
    }

    /// Write the current cart to the guest namespace.
    pub(crate) fn persist_guest(&self) {
        let state = self.store.state();
        if !state.owner.is_guest() {
            return;
        }
        if let Err(e) = local::save_cart(&self.local, &CartOwnerKey::Guest, &state.cart) {
            warn!(error = %e, "Failed to persist guest cart");
            self.store
                .dispatch(CartAction::SetError(Some(format!("No se pudo guardar el carrito: {e}"))));
        }
    }

    /// Tentative apply, then confirm with the remote snapshot or fall back.
    async fn two_phase<F>(&self, action: CartAction, call: F) -> MutationOutcome
    where
        F: Future<Output = std::result::Result<RemoteCart, RemoteError>>,
    {
        let before = self.store.state();
        let tentative = self.store.dispatch(action);
        self.store.dispatch(CartAction::SetLoading(true));

        match call.await {
            Ok(snapshot) => {
                let cart = snapshot.into_cart(self.currency());
                if self
                    .store
                    .dispatch_if(tentative, CartAction::SetFromRemote(cart))
                    .is_some()
                {
                    MutationOutcome::Confirmed
                } else {
                    debug!("Remote snapshot superseded by a newer state");
                    self.settle(tentative.epoch, None);
                    MutationOutcome::Superseded
                }
            }
            Err(e) => {
                warn!(error = %e, "Remote cart mutation failed, falling back to local state");
                let error = e.to_string();
                let outcome = match self.fallback {
                    FallbackPolicy::KeepLocal => MutationOutcome::Fallback {
                        error: error.clone(),
                    },
                    FallbackPolicy::Rollback => {
                        if self
                            .store
                            .dispatch_if(tentative, CartAction::Load(before.cart))
                            .is_some()
                        {
                            MutationOutcome::RolledBack {
                                error: error.clone(),
                            }
                        } else {
                            debug!("Newer state exists, not rolling back");
                            MutationOutcome::Fallback {
                                error: error.clone(),
                            }
                        }
                    }
                };
                self.settle(tentative.epoch, Some(error));
                outcome
            }
        }
    }

    /// Clear the loading flag and record `error`, unless the owner changed.
    fn settle(&self, epoch: u64, error: Option<String>) {
        if let Some(error) = error {
            self.store
                .dispatch_in_epoch(epoch, CartAction::SetError(Some(error)));
        }
        self.store
            .dispatch_in_epoch(epoch, CartAction::SetLoading(false));
    }
}

/// Units that can still be added on top of `existing` without passing
/// `stock`.
pub(crate) const fn stock_headroom(existing: u32, quantity: u32, stock: u32) -> u32 {
    let target = existing.saturating_add(quantity);
    let target = if target < stock { target } else { stock };
    target.saturating_sub(existing)
}
