//! Cart line items.
//!
//! A [`CartLineItem`] can only exist with `1 <= quantity <= stock_limit`.
//! Construction goes through [`CartLineItem::new`] or the
//! [`LineItemRecord`] conversion, both of which check the invariant, and all
//! later quantity changes clamp instead of failing.

use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId};
use super::price::Price;
use super::product::{Product, default_seller};

/// Stock limit assumed when the remote cart does not report one.
pub const DEFAULT_STOCK_LIMIT: u32 = 999;

/// Errors that can occur when building a [`CartLineItem`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineItemError {
    /// Quantity must be at least one.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// The product has no stock.
    #[error("product {0} is out of stock")]
    OutOfStock(ProductId),
    /// Quantity is above the stock limit.
    #[error("quantity {quantity} exceeds stock limit {stock}")]
    ExceedsStock {
        /// Requested quantity.
        quantity: u32,
        /// Available stock.
        stock: u32,
    },
}

/// One product entry in a cart, with its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LineItemRecord", into = "LineItemRecord")]
pub struct CartLineItem {
    product_id: ProductId,
    item_id: Option<CartItemId>,
    title: String,
    unit_price: Price,
    quantity: u32,
    stock_limit: u32,
    free_shipping: bool,
    seller_nickname: String,
    thumbnail: Option<String>,
}

impl CartLineItem {
    /// Create a line item for `product`.
    ///
    /// # Errors
    ///
    /// Returns `LineItemError` if `quantity` is zero, the product is out of
    /// stock, or `quantity` exceeds the product stock.
    pub fn new(product: &Product, quantity: u32) -> Result<Self, LineItemError> {
        validate(product.id, quantity, product.stock)?;
        Ok(Self {
            product_id: product.id,
            item_id: None,
            title: product.title.clone(),
            unit_price: product.unit_price,
            quantity,
            stock_limit: product.stock,
            free_shipping: product.free_shipping,
            seller_nickname: product.seller_nickname.clone(),
            thumbnail: product.thumbnail.clone(),
        })
    }

    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Server-side line id, present once the item lives in a remote cart.
    #[must_use]
    pub const fn item_id(&self) -> Option<CartItemId> {
        self.item_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub const fn unit_price(&self) -> Price {
        self.unit_price
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub const fn stock_limit(&self) -> u32 {
        self.stock_limit
    }

    #[must_use]
    pub const fn free_shipping(&self) -> bool {
        self.free_shipping
    }

    #[must_use]
    pub fn seller_nickname(&self) -> &str {
        &self.seller_nickname
    }

    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Set the quantity, clamped to `[1, stock_limit]`.
    pub(crate) fn set_quantity_clamped(&mut self, quantity: u32) {
        self.quantity = quantity.clamp(1, self.stock_limit.max(1));
    }

    /// Lower the stock limit, pulling the quantity down with it.
    pub(crate) fn restrict_stock(&mut self, stock_limit: u32) {
        if stock_limit > 0 && stock_limit < self.stock_limit {
            self.stock_limit = stock_limit;
            self.quantity = self.quantity.min(stock_limit);
        }
    }

    /// Refresh product data (price, stock, seller) from a newer snapshot.
    pub(crate) fn refresh_from(&mut self, product: &Product) {
        self.title.clone_from(&product.title);
        self.unit_price = product.unit_price;
        self.free_shipping = product.free_shipping;
        self.seller_nickname.clone_from(&product.seller_nickname);
        if product.stock > 0 {
            self.stock_limit = product.stock;
            self.quantity = self.quantity.min(product.stock);
        }
    }
}

fn validate(product_id: ProductId, quantity: u32, stock: u32) -> Result<(), LineItemError> {
    if stock == 0 {
        return Err(LineItemError::OutOfStock(product_id));
    }
    if quantity == 0 {
        return Err(LineItemError::ZeroQuantity);
    }
    if quantity > stock {
        return Err(LineItemError::ExceedsStock { quantity, stock });
    }
    Ok(())
}

/// Plain serialized shape of a line item.
///
/// This is what the local store writes and what remote snapshots are mapped
/// into. Converting back into a [`CartLineItem`] re-checks the invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub product_id: ProductId,
    #[serde(default)]
    pub item_id: Option<CartItemId>,
    pub title: String,
    pub unit_price: Price,
    pub quantity: u32,
    #[serde(default = "default_stock_limit")]
    pub stock_limit: u32,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default = "default_seller")]
    pub seller_nickname: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

const fn default_stock_limit() -> u32 {
    DEFAULT_STOCK_LIMIT
}

impl TryFrom<LineItemRecord> for CartLineItem {
    type Error = LineItemError;

    fn try_from(record: LineItemRecord) -> Result<Self, Self::Error> {
        validate(record.product_id, record.quantity, record.stock_limit)?;
        Ok(Self {
            product_id: record.product_id,
            item_id: record.item_id,
            title: record.title,
            unit_price: record.unit_price,
            quantity: record.quantity,
            stock_limit: record.stock_limit,
            free_shipping: record.free_shipping,
            seller_nickname: record.seller_nickname,
            thumbnail: record.thumbnail,
        })
    }
}

impl From<CartLineItem> for LineItemRecord {
    fn from(item: CartLineItem) -> Self {
        Self {
            product_id: item.product_id,
            item_id: item.item_id,
            title: item.title,
            unit_price: item.unit_price,
            quantity: item.quantity,
            stock_limit: item.stock_limit,
            free_shipping: item.free_shipping,
            seller_nickname: item.seller_nickname,
            thumbnail: item.thumbnail,
        }
    }
}
