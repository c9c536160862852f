//! In-memory cart store.
//!
//! The store is the single source of truth for what the UI shows. It is an
//! explicit object with a `state` / `dispatch` / `subscribe` interface, owned
//! by the [`CartEngine`](crate::engine::CartEngine) and shared by reference.
//!
//! # Stale writes
//!
//! Every state carries two counters:
//!
//! - `version` - bumped whenever the cart contents change
//! - `epoch` - bumped whenever the cart owner changes (login/logout)
//!
//! Async flows capture a [`Stamp`] before suspending and write back through
//! [`CartStore::dispatch_if`], which refuses the write if anything newer has
//! happened meanwhile.

use std::sync::Arc;

use mercado_cart_core::{Cart, CartOwnerKey, Product, ProductId};
use tokio::sync::watch;

/// Snapshot of everything the store holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    pub cart: Cart,
    pub owner: CartOwnerKey,
    /// A remote operation is in flight.
    pub loading: bool,
    /// Last cart operation error, for optional inline display.
    pub error: Option<String>,
    pub version: u64,
    pub epoch: u64,
}

impl Default for CartState {
    fn default() -> Self {
        Self {
            cart: Cart::new(),
            owner: CartOwnerKey::Guest,
            loading: false,
            error: None,
            version: 0,
            epoch: 0,
        }
    }
}

impl CartState {
    /// The point in history this state represents.
    #[must_use]
    pub const fn stamp(&self) -> Stamp {
        Stamp {
            epoch: self.epoch,
            version: self.version,
        }
    }
}

/// Position of a state in the store's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp {
    pub epoch: u64,
    pub version: u64,
}

/// Actions the reducer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add units of a product, clamped to stock.
    AddItem { product: Product, quantity: u32 },
    /// Remove a product's line if present.
    RemoveItem(ProductId),
    /// Set a line's quantity, clamped to `[1, stock]`; `<= 0` removes.
    SetQuantity { product_id: ProductId, quantity: i64 },
    /// Empty the cart.
    Clear,
    /// Replace the contents (namespace load or rollback).
    Load(Cart),
    /// Replace the contents with an authoritative remote snapshot.
    SetFromRemote(Cart),
    SetLoading(bool),
    SetError(Option<String>),
}

/// Apply `action` to `state`.
///
/// Pure: the caller decides what to do with the result. The content
/// `version` is bumped only when the cart contents actually change.
#[must_use]
pub fn reduce(state: &CartState, action: CartAction) -> CartState {
    let mut next = state.clone();
    let changed = match action {
        CartAction::AddItem { product, quantity } => next.cart.add_item(&product, quantity),
        CartAction::RemoveItem(product_id) => next.cart.remove_item(product_id),
        CartAction::SetQuantity {
            product_id,
            quantity,
        } => next.cart.set_quantity(product_id, quantity),
        CartAction::Clear => {
            let had_items = !next.cart.is_empty();
            next.cart.clear();
            had_items
        }
        CartAction::Load(cart) => replace_cart(&mut next.cart, cart),
        CartAction::SetFromRemote(cart) => {
            next.loading = false;
            next.error = None;
            replace_cart(&mut next.cart, cart)
        }
        CartAction::SetLoading(loading) => {
            next.loading = loading;
            false
        }
        CartAction::SetError(error) => {
            next.error = error;
            false
        }
    };

    if changed {
        next.version += 1;
    }
    next
}

fn replace_cart(current: &mut Cart, cart: Cart) -> bool {
    if *current == cart {
        return false;
    }
    *current = cart;
    true
}

// =============================================================================
// CartStore
// =============================================================================

/// Shared, observable cart state container.
///
/// Cheap to clone; clones observe and mutate the same state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<watch::Sender<CartState>>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore {
    /// A store holding an empty guest cart.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.borrow().clone()
    }

    /// Current stamp, without cloning the cart.
    #[must_use]
    pub fn stamp(&self) -> Stamp {
        self.inner.borrow().stamp()
    }

    /// Apply an action unconditionally. Returns the stamp after it.
    pub fn dispatch(&self, action: CartAction) -> Stamp {
        let mut stamp = Stamp {
            epoch: 0,
            version: 0,
        };
        self.inner.send_if_modified(|state| {
            let next = reduce(state, action);
            stamp = next.stamp();
            let modified = next != *state;
            *state = next;
            modified
        });
        stamp
    }

    /// Apply an action only if the state is still at `expected`.
    ///
    /// Returns the new stamp, or `None` if the state moved on (a newer
    /// mutation or an owner change happened) and the action was dropped.
    pub fn dispatch_if(&self, expected: Stamp, action: CartAction) -> Option<Stamp> {
        let mut applied = None;
        self.inner.send_if_modified(|state| {
            if state.stamp() != expected {
                return false;
            }
            let next = reduce(state, action);
            applied = Some(next.stamp());
            let modified = next != *state;
            *state = next;
            modified
        });
        applied
    }

    /// Apply an action only if the owner has not changed since `epoch`.
    ///
    /// Returns `true` if the action was applied.
    pub fn dispatch_in_epoch(&self, epoch: u64, action: CartAction) -> bool {
        let mut applied = false;
        self.inner.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            let next = reduce(state, action);
            applied = true;
            let modified = next != *state;
            *state = next;
            modified
        });
        applied
    }

    /// Switch to a new owner: bump the epoch, drop the in-memory cart and
    /// mark the store as loading. Returns the new epoch.
    pub fn begin_epoch(&self, owner: CartOwnerKey) -> u64 {
        let mut epoch = 0;
        self.inner.send_modify(|state| {
            state.epoch += 1;
            if !state.cart.is_empty() {
                state.cart.clear();
                state.version += 1;
            }
            state.owner = owner;
            state.loading = true;
            state.error = None;
            epoch = state.epoch;
        });
        epoch
    }

    /// Receive every new state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use mercado_cart_core::{CurrencyCode, Price};

    use super::*;

    fn product(id: i64, stock: u32) -> Product {
        Product::new(
            ProductId::new(id),
            "Yerba",
            Price::from_minor_units(300_000, CurrencyCode::ARS),
            stock,
        )
    }

    fn add(id: i64, stock: u32, quantity: u32) -> CartAction {
        CartAction::AddItem {
            product: product(id, stock),
            quantity,
        }
    }

    #[test]
    fn test_reduce_bumps_version_only_on_content_change() {
        let state = CartState::default();
        let next = reduce(&state, add(1, 5, 1));
        assert_eq!(next.version, 1);

        let next = reduce(&next, CartAction::SetLoading(true));
        assert_eq!(next.version, 1);
        assert!(next.loading);

        let next = reduce(&next, CartAction::RemoveItem(ProductId::new(42)));
        assert_eq!(next.version, 1);
    }

    #[test]
    fn test_reduce_add_existing_clamps() {
        let state = reduce(&CartState::default(), add(1, 5, 4));
        let state = reduce(&state, add(1, 5, 3));
        assert_eq!(state.cart.item_quantity(ProductId::new(1)), 5);
    }

    #[test]
    fn test_set_from_remote_clears_flags() {
        let mut state = CartState::default();
        state.loading = true;
        state.error = Some("boom".to_string());
        let next = reduce(&state, CartAction::SetFromRemote(Cart::new()));
        assert!(!next.loading);
        assert!(next.error.is_none());
    }

    #[test]
    fn test_dispatch_if_rejects_stale_stamp() {
        let store = CartStore::new();
        let stale = store.stamp();
        store.dispatch(add(1, 5, 1));

        assert!(store.dispatch_if(stale, CartAction::Clear).is_none());
        assert_eq!(store.state().cart.len(), 1);

        let current = store.stamp();
        assert!(store.dispatch_if(current, CartAction::Clear).is_some());
        assert!(store.state().cart.is_empty());
    }

    #[test]
    fn test_begin_epoch_resets_and_fences_old_writes() {
        let store = CartStore::new();
        store.dispatch(add(1, 5, 2));
        let before = store.state().epoch;

        let epoch = store.begin_epoch(CartOwnerKey::User("9".to_string()));
        assert_eq!(epoch, before + 1);
        let state = store.state();
        assert!(state.cart.is_empty());
        assert!(state.loading);
        assert_eq!(state.owner, CartOwnerKey::User("9".to_string()));

        assert!(!store.dispatch_in_epoch(before, CartAction::Load(Cart::new())));
        assert!(store.dispatch_in_epoch(epoch, CartAction::SetLoading(false)));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = CartStore::new();
        let mut rx = store.subscribe();

        store.dispatch(add(1, 5, 1));
        rx.changed().await.expect("store alive");
        assert_eq!(rx.borrow_and_update().cart.len(), 1);

        // No-op actions do not wake subscribers
        store.dispatch(CartAction::RemoveItem(ProductId::new(99)));
        assert!(!rx.has_changed().expect("store alive"));
    }
}
