//! Engine mutations and login reconciliation against the mock cart service,
//! with guest carts persisted on disk.

#![allow(clippy::unwrap_used)]

use mercado_cart_core::{
    CartOwnerKey, CurrencyCode, Identity, PendingIntent, Price, Product, ProductId,
};
use mercado_cart_integration_tests::{MockCartService, MockProduct};
use mercado_cart_sync::local::{self, FileStore, LocalStore};
use mercado_cart_sync::remote::HttpCartRemote;
use mercado_cart_sync::{CartConfig, CartEngine, FallbackPolicy, MutationOutcome};
use tempfile::TempDir;

struct TestContext {
    service: MockCartService,
    _dir: TempDir,
    engine: CartEngine<HttpCartRemote, FileStore>,
}

impl TestContext {
    async fn new(fallback: FallbackPolicy) -> Self {
        let service = MockCartService::start().await;
        service.add_product(1, MockProduct::new("Mate imperial", 1_500_000, 5));
        service.add_product(2, MockProduct::new("Yerba 1kg", 450_000, 10));
        service.add_product(3, MockProduct::new("Termo", 9_000_000, 2).with_free_shipping());

        let dir = tempfile::tempdir().unwrap();
        let mut config = CartConfig::with_remote(service.remote_config(None));
        config.storage_dir = dir.path().join("carts");
        config.fallback = fallback;
        let engine = CartEngine::from_config(&config).unwrap();

        Self {
            service,
            _dir: dir,
            engine,
        }
    }
}

/// Product as the storefront lists it.
fn product(id: i64, stock: u32) -> Product {
    Product::new(
        ProductId::new(id),
        format!("Producto {id}"),
        Price::from_minor_units(1_500_000, CurrencyCode::ARS),
        stock,
    )
}

fn cart_ids(ctx: &TestContext) -> Vec<i64> {
    ctx.engine
        .summary()
        .items()
        .iter()
        .map(|i| i.product_id().as_i64())
        .collect()
}

#[tokio::test]
async fn test_guest_cart_survives_restart() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.engine.add_item(&product(1, 5), 2).await;
    ctx.engine.add_item(&product(2, 10), 1).await;

    let reloaded = local::load_cart(ctx.engine.local(), &CartOwnerKey::Guest);
    assert_eq!(reloaded.item_quantity(ProductId::new(1)), 2);
    assert_eq!(reloaded.len(), 2);
    assert!(ctx.service.requests().is_empty());
}

#[tokio::test]
async fn test_login_merges_guest_cart_into_remote() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.service.seed_line("42", 2, 1);
    ctx.engine.add_item(&product(1, 5), 2).await;

    let report = ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    assert_eq!(report.merged_lines, 1);
    assert_eq!(cart_ids(&ctx), vec![2, 1]);
    assert_eq!(ctx.service.product_ids("42"), vec![2, 1]);
    assert_eq!(ctx.service.quantity("42", 1), 2);
    assert!(ctx.engine.local().get("mercado-cart-guest").unwrap().is_none());
}

#[tokio::test]
async fn test_login_merge_respects_stock() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.service.seed_line("42", 1, 3);
    ctx.engine.add_item(&product(1, 5), 4).await;

    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    assert_eq!(ctx.service.quantity("42", 1), 5);
    assert_eq!(ctx.engine.summary().item_quantity(ProductId::new(1)), 5);
}

#[tokio::test]
async fn test_login_replays_pending_intent() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.engine
        .capture_pending_intent(PendingIntent::new(ProductId::new(3)))
        .await;

    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    let summary = ctx.engine.summary();
    assert_eq!(summary.item_quantity(ProductId::new(3)), 1);
    assert!(summary.shipping_cost().amount.is_zero());
}

#[tokio::test]
async fn test_user_mutations_reach_the_service() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    let outcome = ctx.engine.add_item(&product(2, 10), 2).await;
    assert_eq!(outcome, MutationOutcome::Confirmed);
    assert_eq!(ctx.service.quantity("42", 2), 2);

    ctx.engine.set_quantity(ProductId::new(2), 4).await;
    assert_eq!(ctx.service.quantity("42", 2), 4);

    ctx.engine.set_quantity(ProductId::new(2), 0).await;
    assert!(ctx.service.product_ids("42").is_empty());
    assert!(ctx.engine.summary().cart().is_empty());
}

#[tokio::test]
async fn test_user_add_never_pushes_the_service_past_stock() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.service.seed_line("42", 1, 4);
    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    ctx.engine.add_item(&product(1, 5), 3).await;
    assert_eq!(ctx.service.quantity("42", 1), 5);
    assert_eq!(ctx.engine.summary().item_quantity(ProductId::new(1)), 5);

    let outcome = ctx.engine.add_item(&product(1, 5), 1).await;
    assert_eq!(outcome, MutationOutcome::Local);
    assert_eq!(ctx.service.quantity("42", 1), 5);
}

#[tokio::test]
async fn test_pending_intent_respects_stock_after_merge() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.service.seed_line("42", 3, 1);
    ctx.engine
        .capture_pending_intent(PendingIntent::new(ProductId::new(3)).with_quantity(2))
        .await;

    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    assert_eq!(ctx.service.quantity("42", 3), 2);
    assert_eq!(ctx.engine.summary().item_quantity(ProductId::new(3)), 2);
}

#[tokio::test]
async fn test_service_outage_keeps_local_change() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;
    ctx.service.set_failing(true);

    let outcome = ctx.engine.add_item(&product(1, 5), 1).await;

    assert!(matches!(outcome, MutationOutcome::Fallback { .. }));
    let summary = ctx.engine.summary();
    assert_eq!(summary.item_quantity(ProductId::new(1)), 1);
    assert!(summary.error().unwrap().contains("503"));
    assert!(!summary.loading());
}

#[tokio::test]
async fn test_service_outage_rolls_back_when_configured() {
    let ctx = TestContext::new(FallbackPolicy::Rollback).await;
    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;
    ctx.service.set_failing(true);

    let outcome = ctx.engine.add_item(&product(1, 5), 1).await;

    assert!(matches!(outcome, MutationOutcome::RolledBack { .. }));
    assert!(ctx.engine.summary().cart().is_empty());
}

#[tokio::test]
async fn test_login_during_outage_degrades_and_keeps_guest_cart() {
    let ctx = TestContext::new(FallbackPolicy::KeepLocal).await;
    ctx.engine.add_item(&product(1, 5), 2).await;
    ctx.service.set_failing(true);

    let report = ctx.engine.set_identity(Some(Identity::with_id("42"))).await;

    assert!(report.degraded);
    assert!(ctx.engine.summary().cart().is_empty());
    assert!(ctx.engine.summary().error().is_some());

    // Service recovers: the guest cart is merged on the next login
    ctx.service.set_failing(false);
    ctx.engine.set_identity(None).await;
    assert_eq!(ctx.engine.summary().item_quantity(ProductId::new(1)), 2);
    ctx.engine.set_identity(Some(Identity::with_id("42"))).await;
    assert_eq!(ctx.service.quantity("42", 1), 2);
}
