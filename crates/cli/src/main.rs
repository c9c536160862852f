//! Mercado Cart CLI - Drive the cart engine from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show the guest cart
//! cart-cli show
//!
//! # Add a product to user 42's cart
//! cart-cli --user 42 add --product-id 7 --title "Mate" --price 1500 --stock 10
//!
//! # Change a quantity (0 removes the line)
//! cart-cli --user 42 set-quantity --product-id 7 --quantity 3
//!
//! # Log in, merging the guest cart
//! cart-cli login --user 42
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart with totals
//! - `add` / `remove` / `set-quantity` / `clear` - Mutate the cart
//! - `login` - Reconcile the guest cart into a user's cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::cart::{self, ProductInput};

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Mercado Cart command-line driver")]
struct Cli {
    /// Act as this user (id or email); the guest cart is used when omitted
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart with totals
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        #[arg(long)]
        product_id: i64,

        /// Product title
        #[arg(long)]
        title: String,

        /// Unit price in standard units (e.g. 1234.50)
        #[arg(long)]
        price: Decimal,

        /// Units in stock
        #[arg(long)]
        stock: u32,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// The product ships for free
        #[arg(long)]
        free_shipping: bool,

        /// Seller nickname
        #[arg(long)]
        seller: Option<String>,

        /// Product image URL
        #[arg(long)]
        thumbnail: Option<String>,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        #[arg(long)]
        product_id: i64,
    },
    /// Set the quantity of a product already in the cart
    SetQuantity {
        /// Product ID
        #[arg(long)]
        product_id: i64,

        /// New quantity; zero or less removes the product
        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
    /// Log in and merge the guest cart into the user's cart
    Login {
        /// Product the visitor tried to add before logging in
        #[arg(long)]
        pending_product: Option<i64>,

        /// Units of the pending product
        #[arg(long, default_value_t = 1, requires = "pending_product")]
        pending_quantity: u32,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN")
        .ok()
        .filter(|v| !v.trim().is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Warnings and errors become Sentry events, info and debug breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load .env before Sentry reads SENTRY_DSN
    let _ = dotenvy::dotenv();
    let _sentry_guard = init_sentry();

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mercado_cart_sync=info,mercado_cart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let user = cli.user.as_deref();
    match cli.command {
        Commands::Show => cart::show(user).await?,
        Commands::Add {
            product_id,
            title,
            price,
            stock,
            quantity,
            free_shipping,
            seller,
            thumbnail,
        } => {
            let input = ProductInput {
                id: product_id,
                title,
                price,
                stock,
                free_shipping,
                seller,
                thumbnail,
            };
            cart::add(user, input, quantity).await?;
        }
        Commands::Remove { product_id } => cart::remove(user, product_id).await?,
        Commands::SetQuantity {
            product_id,
            quantity,
        } => cart::set_quantity(user, product_id, quantity).await?,
        Commands::Clear => cart::clear(user).await?,
        Commands::Login {
            pending_product,
            pending_quantity,
        } => cart::login(user, pending_product, pending_quantity).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_global_user() {
        let cli = Cli::try_parse_from([
            "cart-cli", "add", "--product-id", "7", "--title", "Mate", "--price", "1500.50",
            "--stock", "3", "-q", "2", "--user", "42",
        ]);
        let Ok(cli) = cli else {
            panic!("add should parse");
        };
        assert_eq!(cli.user.as_deref(), Some("42"));
        assert!(matches!(
            cli.command,
            Commands::Add { product_id: 7, quantity: 2, stock: 3, free_shipping: false, .. }
        ));
    }

    #[test]
    fn test_parse_add_with_thumbnail() {
        let cli = Cli::try_parse_from([
            "cart-cli", "add", "--product-id", "7", "--title", "Mate", "--price", "1500",
            "--stock", "3", "--thumbnail", "https://img.example/mate.jpg",
        ]);
        let Ok(Cli { command: Commands::Add { thumbnail, .. }, .. }) = cli else {
            panic!("add should parse");
        };
        assert_eq!(thumbnail.as_deref(), Some("https://img.example/mate.jpg"));
    }

    #[test]
    fn test_parse_negative_quantity() {
        let cli = Cli::try_parse_from([
            "cart-cli", "set-quantity", "--product-id", "7", "--quantity", "-1",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::SetQuantity { quantity: -1, .. })
        ));
    }

    #[test]
    fn test_pending_quantity_requires_product() {
        let cli = Cli::try_parse_from(["cart-cli", "login", "--pending-quantity", "2"]);
        assert!(cli.is_err());
    }
}
