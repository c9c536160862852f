//! Catalog product snapshot.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product as seen by the cart at the moment it is added.
///
/// Only the fields the cart needs are kept. `stock` is the upper bound for
/// the quantity of a line item referencing this product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub unit_price: Price,
    pub stock: u32,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default = "default_seller")]
    pub seller_nickname: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

pub(crate) fn default_seller() -> String {
    "Vendedor".to_string()
}

impl Product {
    /// Create a product with paid shipping and the default seller name.
    #[must_use]
    pub fn new(id: ProductId, title: impl Into<String>, unit_price: Price, stock: u32) -> Self {
        Self {
            id,
            title: title.into(),
            unit_price,
            stock,
            free_shipping: false,
            seller_nickname: default_seller(),
            thumbnail: None,
        }
    }

    #[must_use]
    pub const fn with_free_shipping(mut self, free_shipping: bool) -> Self {
        self.free_shipping = free_shipping;
        self
    }

    #[must_use]
    pub fn with_seller(mut self, nickname: impl Into<String>) -> Self {
        self.seller_nickname = nickname.into();
        self
    }

    #[must_use]
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    /// Whether any unit can be put in a cart at all.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
