//! Identity changes: login, logout and user switch.
//!
//! On login the guest cart is folded into the user's remote cart, a parked
//! pending intent is replayed, and the result is published, all fenced by the
//! store epoch so a later identity change wins over a slow reconciliation.
//!
//! When the remote cart cannot be read or the guest lines cannot all be
//! pushed, an empty cart is published with the error flag set rather than a
//! stale or half-merged one.

use mercado_cart_core::{Cart, CartOwnerKey, Identity, PendingIntent, ProductId};
use tracing::{debug, info, instrument, warn};

use crate::engine::{CartEngine, stock_headroom};
use crate::local::{self, LocalStore};
use crate::remote::CartRemote;
use crate::store::CartAction;

/// What happened to the parked pending intent during a login.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IntentOutcome {
    /// Nothing was parked, or it had expired.
    #[default]
    None,
    /// The product was added to the remote cart.
    Applied(ProductId),
    /// The remote add failed. The intent is gone either way.
    Failed { product_id: ProductId, error: String },
    /// The remote cart was unavailable, so the intent was discarded.
    Dropped(ProductId),
}

/// Result of an identity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Owner the store switched to.
    pub owner: CartOwnerKey,
    /// Guest lines pushed to the remote cart.
    pub merged_lines: usize,
    /// Guest lines whose push failed, kept in the guest namespace.
    pub kept_guest_lines: usize,
    pub intent: IntentOutcome,
    /// The remote cart could not be fetched or fully merged; an empty cart
    /// was shown.
    pub degraded: bool,
    /// A newer identity change happened first; nothing was published.
    pub superseded: bool,
}

impl ReconcileReport {
    fn new(owner: CartOwnerKey) -> Self {
        Self {
            owner,
            merged_lines: 0,
            kept_guest_lines: 0,
            intent: IntentOutcome::None,
            degraded: false,
            superseded: false,
        }
    }
}

impl<R: CartRemote, L: LocalStore> CartEngine<R, L> {
    /// Switch the cart to `identity`, `None` meaning anonymous.
    ///
    /// Never fails: a remote that cannot be reached degrades to an empty
    /// cart with the error flag set.
    #[instrument(skip(self, identity))]
    pub async fn set_identity(&self, identity: Option<Identity>) -> ReconcileReport {
        let owner = CartOwnerKey::for_identity(identity.as_ref());
        let epoch = self.store.begin_epoch(owner.clone());
        let mut report = ReconcileReport::new(owner.clone());

        let Some(remote_id) = owner.remote_id() else {
            let cart = local::load_cart(&self.local, &CartOwnerKey::Guest);
            self.store.dispatch_in_epoch(epoch, CartAction::Load(cart));
            report.superseded = !self
                .store
                .dispatch_in_epoch(epoch, CartAction::SetLoading(false));
            debug!("Switched to guest cart");
            return report;
        };

        let mut errors = Vec::new();
        let resolved = match self.remote.fetch_cart(remote_id).await {
            Ok(snapshot) => {
                let remote_cart = snapshot.into_cart(self.currency());
                self.merge_guest_cart(remote_id, remote_cart, &mut report, &mut errors)
                    .await
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "Failed to load remote cart");
                errors.push(format!("No se pudo cargar el carrito: {e}"));
                None
            }
        };

        // The intent is consumed whatever happens next
        let intent = self.intents.take(self.session).await;

        let latest = match resolved {
            Some(cart) => match intent {
                Some(intent) => {
                    self.replay_intent(remote_id, cart, intent, &mut report, &mut errors)
                        .await
                }
                None => cart,
            },
            None => {
                warn!(owner = %owner, "Remote cart unavailable, showing an empty cart");
                report.degraded = true;
                if let Some(intent) = intent {
                    report.intent = IntentOutcome::Dropped(intent.product_id);
                }
                Cart::new()
            }
        };

        if !self
            .store
            .dispatch_in_epoch(epoch, CartAction::SetFromRemote(latest))
        {
            debug!(owner = %owner, "Identity changed during reconciliation, dropping result");
            report.superseded = true;
            return report;
        }
        if !errors.is_empty() {
            self.store
                .dispatch_in_epoch(epoch, CartAction::SetError(Some(errors.join("; "))));
        }

        info!(
            owner = %owner,
            merged_lines = report.merged_lines,
            kept_guest_lines = report.kept_guest_lines,
            degraded = report.degraded,
            "Cart reconciled"
        );
        report
    }

    /// Add the pending intent's product to the resolved `cart`.
    ///
    /// When the product is already there, only the units its stock still
    /// allows are sent, and nothing at all when it is full.
    async fn replay_intent(
        &self,
        remote_id: &str,
        cart: Cart,
        intent: PendingIntent,
        report: &mut ReconcileReport,
        errors: &mut Vec<String>,
    ) -> Cart {
        let product_id = intent.product_id;
        let quantity = cart.get(product_id).map_or(intent.quantity, |line| {
            stock_headroom(line.quantity(), intent.quantity, line.stock_limit())
        });
        if quantity == 0 {
            debug!(product_id = %product_id, "Pending product already at stock");
            report.intent = IntentOutcome::Applied(product_id);
            return cart;
        }

        match self.remote.add_item(remote_id, product_id, quantity).await {
            Ok(snapshot) => {
                report.intent = IntentOutcome::Applied(product_id);
                snapshot.into_cart(self.currency())
            }
            Err(e) => {
                warn!(product_id = %product_id, error = %e, "Failed to apply pending intent");
                errors.push(format!("No se pudo agregar el producto: {e}"));
                report.intent = IntentOutcome::Failed {
                    product_id,
                    error: e.to_string(),
                };
                cart
            }
        }
    }

    /// Push the guest cart into the remote one and return the newest snapshot.
    ///
    /// Each merged line is pushed as the difference between its merged and
    /// remote quantity. Lines whose push fails stay in the guest namespace
    /// and `None` is returned, since the remote cart is then only partially
    /// merged. When everything made it, the guest namespace is cleared.
    async fn merge_guest_cart(
        &self,
        remote_id: &str,
        remote_cart: Cart,
        report: &mut ReconcileReport,
        errors: &mut Vec<String>,
    ) -> Option<Cart> {
        let guest = local::load_cart(&self.local, &CartOwnerKey::Guest);
        if guest.is_empty() {
            return Some(remote_cart);
        }

        let merged = remote_cart.merged_with(&guest);
        let mut latest = remote_cart.clone();
        let mut kept = Vec::new();

        for line in merged.items() {
            let product_id = line.product_id();
            let delta = line
                .quantity()
                .saturating_sub(remote_cart.item_quantity(product_id));
            if delta == 0 {
                continue;
            }

            match self.remote.add_item(remote_id, product_id, delta).await {
                Ok(snapshot) => {
                    latest = snapshot.into_cart(self.currency());
                    report.merged_lines += 1;
                }
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "Failed to push guest line");
                    if let Some(guest_line) = guest.get(product_id) {
                        kept.push(guest_line.clone());
                    }
                }
            }
        }

        report.kept_guest_lines = kept.len();
        if kept.is_empty() {
            if let Err(e) = local::discard_cart(&self.local, &CartOwnerKey::Guest) {
                warn!(error = %e, "Failed to clear guest cart after merge");
            }
            return Some(latest);
        }

        errors.push(format!(
            "{} productos no se pudieron sincronizar",
            kept.len()
        ));
        let unsynced = Cart::from_items(kept);
        if let Err(e) = local::save_cart(&self.local, &CartOwnerKey::Guest, &unsynced) {
            warn!(error = %e, "Failed to keep unsynced guest lines");
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::config::FallbackPolicy;
    use crate::engine::tests::{FakeRemote, engine, product, user};

    fn product_ids(cart: &Cart) -> Vec<i64> {
        cart.items().iter().map(|i| i.product_id().as_i64()).collect()
    }

    #[tokio::test]
    async fn test_login_merges_guest_cart_after_remote_lines() {
        let remote = FakeRemote::with_cart("42", &[(2, 1, 10)]);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine.add_item(&product(1, 10), 2).await;

        let report = engine.set_identity(user("42")).await;

        assert_eq!(report.merged_lines, 1);
        assert!(!report.degraded);
        let state = engine.store().state();
        assert_eq!(product_ids(&state.cart), vec![2, 1]);
        assert_eq!(state.cart.item_quantity(ProductId::new(1)), 2);
        assert_eq!(state.cart.item_quantity(ProductId::new(2)), 1);
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(!engine.local().contains("mercado-cart-guest"));
    }

    #[tokio::test]
    async fn test_login_pushes_only_the_clamped_difference() {
        let remote = FakeRemote::with_cart("42", &[(1, 3, 5)]);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine.add_item(&product(1, 5), 4).await;

        engine.set_identity(user("42")).await;

        assert!(engine.remote().calls().iter().any(|c| c == "ADD 42 1 2"));
        assert_eq!(engine.remote().quantity("42", 1), 5);
        assert_eq!(engine.summary().item_quantity(ProductId::new(1)), 5);
    }

    #[tokio::test]
    async fn test_login_with_unreachable_remote_degrades() {
        let remote = FakeRemote::default();
        remote.fail_fetch.store(true, Ordering::SeqCst);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine.add_item(&product(1, 10), 2).await;

        let report = engine.set_identity(user("42")).await;

        assert!(report.degraded);
        let summary = engine.summary();
        assert!(summary.cart().is_empty());
        assert!(summary.error().is_some());
        assert!(!summary.loading());
        // Guest cart is left for a later login
        assert!(engine.local().contains("mercado-cart-guest"));
    }

    #[tokio::test]
    async fn test_failed_pushes_stay_in_guest_namespace() {
        let remote = FakeRemote::default();
        remote.failing.store(true, Ordering::SeqCst);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine.add_item(&product(1, 10), 2).await;

        let report = engine.set_identity(user("42")).await;

        assert_eq!(report.kept_guest_lines, 1);
        assert!(report.degraded);
        assert!(engine.summary().cart().is_empty());
        assert!(engine.summary().error().is_some());
        let guest = local::load_cart(engine.local(), &CartOwnerKey::Guest);
        assert_eq!(guest.item_quantity(ProductId::new(1)), 2);
    }

    #[tokio::test]
    async fn test_pending_intent_applied_once() {
        let engine = engine(FakeRemote::default(), FallbackPolicy::KeepLocal);
        engine
            .capture_pending_intent(PendingIntent::new(ProductId::new(9)).with_quantity(2))
            .await;

        let report = engine.set_identity(user("42")).await;
        assert_eq!(report.intent, IntentOutcome::Applied(ProductId::new(9)));
        assert_eq!(engine.summary().item_quantity(ProductId::new(9)), 2);

        engine.set_identity(None).await;
        let report = engine.set_identity(user("42")).await;
        assert_eq!(report.intent, IntentOutcome::None);
        assert_eq!(engine.remote().quantity("42", 9), 2);
    }

    #[tokio::test]
    async fn test_pending_intent_respects_stock_of_resolved_cart() {
        let remote = FakeRemote::with_cart("42", &[(9, 4, 5)]);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine
            .capture_pending_intent(PendingIntent::new(ProductId::new(9)).with_quantity(3))
            .await;

        let report = engine.set_identity(user("42")).await;
        assert_eq!(report.intent, IntentOutcome::Applied(ProductId::new(9)));
        assert!(engine.remote().calls().iter().any(|c| c == "ADD 42 9 1"));
        assert_eq!(engine.remote().quantity("42", 9), 5);
    }

    #[tokio::test]
    async fn test_pending_intent_at_stock_skips_the_service() {
        let remote = FakeRemote::with_cart("42", &[(9, 5, 5)]);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine
            .capture_pending_intent(PendingIntent::new(ProductId::new(9)))
            .await;

        let report = engine.set_identity(user("42")).await;
        assert_eq!(report.intent, IntentOutcome::Applied(ProductId::new(9)));
        assert_eq!(engine.remote().calls(), vec!["GET 42"]);
        assert_eq!(engine.remote().quantity("42", 9), 5);
    }

    #[tokio::test]
    async fn test_failed_pending_intent_is_still_consumed() {
        let remote = FakeRemote::default();
        remote.failing.store(true, Ordering::SeqCst);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine
            .capture_pending_intent(PendingIntent::new(ProductId::new(9)))
            .await;

        let report = engine.set_identity(user("42")).await;
        assert!(matches!(report.intent, IntentOutcome::Failed { .. }));

        engine.remote().failing.store(false, Ordering::SeqCst);
        let report = engine.set_identity(user("42")).await;
        assert_eq!(report.intent, IntentOutcome::None);
    }

    #[tokio::test]
    async fn test_pending_intent_dropped_when_degraded() {
        let remote = FakeRemote::default();
        remote.fail_fetch.store(true, Ordering::SeqCst);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine
            .capture_pending_intent(PendingIntent::new(ProductId::new(9)))
            .await;

        let report = engine.set_identity(user("42")).await;
        assert_eq!(report.intent, IntentOutcome::Dropped(ProductId::new(9)));
        assert!(!engine.remote().calls().iter().any(|c| c.starts_with("ADD")));
    }

    #[tokio::test]
    async fn test_logout_shows_guest_namespace() {
        let remote = FakeRemote::with_cart("42", &[(2, 1, 10)]);
        let engine = engine(remote, FallbackPolicy::KeepLocal);
        engine.set_identity(user("42")).await;
        assert_eq!(engine.summary().cart().len(), 1);

        let report = engine.set_identity(None).await;
        assert_eq!(report.owner, CartOwnerKey::Guest);
        assert!(engine.summary().cart().is_empty());
        assert!(!engine.summary().loading());
    }

    #[tokio::test]
    async fn test_slow_login_is_superseded_by_logout() {
        let remote = FakeRemote::with_cart("42", &[(2, 1, 10)]);
        remote.fetch_delay_ms.store(50, Ordering::SeqCst);
        let engine = engine(remote, FallbackPolicy::KeepLocal);

        let (login, _) = tokio::join!(engine.set_identity(user("42")), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.set_identity(None).await
        });

        assert!(login.superseded);
        let state = engine.store().state();
        assert_eq!(state.owner, CartOwnerKey::Guest);
        assert!(state.cart.is_empty());
        assert!(!state.loading);
    }
}
