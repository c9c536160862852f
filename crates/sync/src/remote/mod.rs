//! Remote cart service client.
//!
//! # Architecture
//!
//! - The remote service is the source of truth for authenticated carts
//! - Every mutation returns the authoritative post-mutation snapshot
//! - [`CartRemote`] is the seam the engine talks to; [`HttpCartRemote`] is the
//!   `reqwest` implementation, tests plug in in-memory fakes
//!
//! # Endpoints
//!
//! - `GET    /cart/{owner}` - fetch the owner's cart
//! - `POST   /cart/{owner}/items?productId=&quantity=` - add a product
//! - `PUT    /cart/{owner}/items/{itemId}?quantity=` - change a line quantity
//! - `DELETE /cart/{owner}/items/{itemId}` - remove a line
//! - `DELETE /cart/{owner}` - empty the cart
//!
//! # Example
//!
//! ```rust,ignore
//! use mercado_cart_sync::remote::{CartRemote, HttpCartRemote};
//!
//! let remote = HttpCartRemote::new(&config.remote)?;
//! let snapshot = remote.add_item("42", ProductId::new(7), 2).await?;
//! let cart = snapshot.into_cart(CurrencyCode::ARS);
//! ```

mod client;
mod conversions;
pub mod types;

use std::future::Future;

use mercado_cart_core::{CartItemId, ProductId};
use thiserror::Error;

pub use client::HttpCartRemote;
pub use types::{RemoteCart, RemoteCartItem, RemoteOwnerId};

/// Errors that can occur when talking to the remote cart service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Whether the service reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Authenticated CRUD surface of the remote cart service.
///
/// Every call returns the authoritative cart snapshot after the operation.
pub trait CartRemote: Send + Sync {
    /// Fetch the owner's cart.
    fn fetch_cart(&self, owner: &str)
    -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Add `quantity` units of a product (the server sums with any existing line).
    fn add_item(
        &self,
        owner: &str,
        product_id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Set the quantity of an existing line.
    fn update_item(
        &self,
        owner: &str,
        item_id: CartItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Remove a line.
    fn remove_item(
        &self,
        owner: &str,
        item_id: CartItemId,
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Empty the cart.
    fn clear_cart(&self, owner: &str)
    -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_detection() {
        let err = RemoteError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rate_limited_error() {
        let err = RemoteError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
