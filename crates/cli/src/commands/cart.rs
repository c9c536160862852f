//! Cart commands.
//!
//! Every command builds an engine from the environment, switches it to the
//! requested identity (which reconciles the guest cart on login) and then
//! runs one operation.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of product 7 to the guest cart
//! cart-cli add --product-id 7 --title "Mate" --price 1500 --stock 10 -q 2
//!
//! # Log in as user 42, merging the guest cart and replaying a pending add
//! cart-cli login --user 42 --pending-product 9
//!
//! # Show user 42's cart
//! cart-cli --user 42 show
//! ```
//!
//! # Environment Variables
//!
//! See `mercado_cart_sync::config` for the full list.

use mercado_cart_core::{Identity, PendingIntent, Price, Product, ProductId};
use mercado_cart_sync::local::FileStore;
use mercado_cart_sync::remote::HttpCartRemote;
use mercado_cart_sync::{
    CartConfig, CartEngine, CartError, CartSummary, IntentOutcome, MutationOutcome,
    ReconcileReport,
};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Engine could not be built.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The command needs a logged-in user.
    #[error("This command requires --user")]
    MissingUser,

    /// Invalid product data on the command line.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
}

/// Product attributes given on the command line.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub id: i64,
    pub title: String,
    pub price: Decimal,
    pub stock: u32,
    pub free_shipping: bool,
    pub seller: Option<String>,
    pub thumbnail: Option<String>,
}

type Engine = CartEngine<HttpCartRemote, FileStore>;

/// Build the engine and switch it to `user`.
async fn open(user: Option<&str>) -> Result<(Engine, CartConfig), CommandError> {
    let config = CartConfig::from_env().map_err(CartError::from)?;
    let engine = CartEngine::from_config(&config)?;
    let report = engine.set_identity(user.map(Identity::with_id)).await;
    log_report(&report);
    Ok((engine, config))
}

fn log_report(report: &ReconcileReport) {
    if report.degraded {
        tracing::warn!(owner = %report.owner, "Remote cart unavailable, showing an empty cart");
    }
    if report.kept_guest_lines > 0 {
        tracing::warn!(
            "{} guest products could not be synced and were kept for later",
            report.kept_guest_lines
        );
    }
    match &report.intent {
        IntentOutcome::None => {}
        IntentOutcome::Applied(product_id) => {
            tracing::info!("Pending product {product_id} added to the cart");
        }
        IntentOutcome::Failed { product_id, error } => {
            tracing::warn!("Pending product {product_id} could not be added: {error}");
        }
        IntentOutcome::Dropped(product_id) => {
            tracing::warn!("Pending product {product_id} discarded, cart unavailable");
        }
    }
}

fn log_outcome(outcome: &MutationOutcome) {
    match outcome {
        MutationOutcome::Local => tracing::debug!("Cart updated locally"),
        MutationOutcome::Confirmed => tracing::debug!("Cart confirmed by the service"),
        MutationOutcome::Superseded => tracing::debug!("Newer cart state already applied"),
        MutationOutcome::Fallback { error } => {
            tracing::warn!("Cart service failed, keeping local change: {error}");
        }
        MutationOutcome::RolledBack { error } => {
            tracing::warn!("Cart service failed, change undone: {error}");
        }
    }
}

/// Print the cart.
pub async fn show(user: Option<&str>) -> Result<(), CommandError> {
    let (engine, _) = open(user).await?;
    render(&engine.summary(), &engine.owner().to_string());
    Ok(())
}

/// Add a product to the cart.
pub async fn add(
    user: Option<&str>,
    input: ProductInput,
    quantity: u32,
) -> Result<(), CommandError> {
    if input.price.is_sign_negative() {
        return Err(CommandError::InvalidProduct(format!(
            "price must not be negative, got {}",
            input.price
        )));
    }
    if input.title.trim().is_empty() {
        return Err(CommandError::InvalidProduct("title is empty".to_string()));
    }

    let (engine, config) = open(user).await?;
    let mut product = Product::new(
        ProductId::new(input.id),
        input.title,
        Price::new(input.price, config.currency()),
        input.stock,
    )
    .with_free_shipping(input.free_shipping);
    if let Some(seller) = input.seller {
        product = product.with_seller(seller);
    }
    if let Some(thumbnail) = input.thumbnail {
        product = product.with_thumbnail(thumbnail);
    }

    let summary = engine.summary();
    if !summary.can_add_to_cart(&product) {
        tracing::warn!(
            "Product {} has no stock left to add ({} in cart, stock {})",
            product.id,
            summary.item_quantity(product.id),
            product.stock
        );
    }

    log_outcome(&engine.add_item(&product, quantity).await);
    render(&engine.summary(), &engine.owner().to_string());
    Ok(())
}

/// Remove a product's line.
pub async fn remove(user: Option<&str>, product_id: i64) -> Result<(), CommandError> {
    let (engine, _) = open(user).await?;
    log_outcome(&engine.remove_item(ProductId::new(product_id)).await);
    render(&engine.summary(), &engine.owner().to_string());
    Ok(())
}

/// Set a line's quantity; zero or less removes it.
pub async fn set_quantity(
    user: Option<&str>,
    product_id: i64,
    quantity: i64,
) -> Result<(), CommandError> {
    let (engine, _) = open(user).await?;
    log_outcome(
        &engine
            .set_quantity(ProductId::new(product_id), quantity)
            .await,
    );
    render(&engine.summary(), &engine.owner().to_string());
    Ok(())
}

/// Empty the cart.
pub async fn clear(user: Option<&str>) -> Result<(), CommandError> {
    let (engine, _) = open(user).await?;
    log_outcome(&engine.clear().await);
    render(&engine.summary(), &engine.owner().to_string());
    Ok(())
}

/// Log in, optionally replaying an add-to-cart attempted before login.
pub async fn login(
    user: Option<&str>,
    pending_product: Option<i64>,
    pending_quantity: u32,
) -> Result<(), CommandError> {
    let user = user.ok_or(CommandError::MissingUser)?;
    let config = CartConfig::from_env().map_err(CartError::from)?;
    let engine = CartEngine::from_config(&config)?;

    // The visitor starts anonymous
    engine.set_identity(None).await;
    if let Some(product_id) = pending_product {
        let intent = PendingIntent::new(ProductId::new(product_id)).with_quantity(pending_quantity);
        engine.capture_pending_intent(intent).await;
    }

    let report = engine.set_identity(Some(Identity::with_id(user))).await;
    log_report(&report);
    tracing::info!(
        owner = %report.owner,
        merged_lines = report.merged_lines,
        "Logged in"
    );
    render(&engine.summary(), &engine.owner().to_string());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn render(summary: &CartSummary, owner: &str) {
    println!("Carrito de {owner} ({} productos)", summary.total_items());
    if summary.items().is_empty() {
        println!("  (vacío)");
    }
    for item in summary.items() {
        let shipping = if item.free_shipping() {
            " [envío gratis]"
        } else {
            ""
        };
        println!(
            "  [{}] {} x{}  {}  - {}{shipping}",
            item.product_id(),
            item.title(),
            item.quantity(),
            CartSummary::format_price(item.line_total()),
            item.seller_nickname(),
        );
        if let Some(thumbnail) = item.thumbnail() {
            println!("      {thumbnail}");
        }
    }

    let shipping = summary.shipping_cost();
    let shipping = if shipping.amount.is_zero() {
        "Gratis".to_string()
    } else {
        CartSummary::format_price(shipping)
    };
    println!("Subtotal: {}", CartSummary::format_price(summary.subtotal()));
    println!("Envío:    {shipping}");
    println!("Total:    {}", CartSummary::format_price(summary.total()));
    if let Some(error) = summary.error() {
        println!("Atención: {error}");
    }
}
