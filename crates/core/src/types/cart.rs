//! Cart contents and the pure operations over them.
//!
//! A [`Cart`] is an ordered list of [`CartLineItem`]s with unique product
//! ids. Every operation here is synchronous and total: stock violations are
//! clamped and unknown product ids are ignored, so callers never have to
//! handle an error from a cart mutation.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::line_item::CartLineItem;
use super::price::{CurrencyCode, Price};
use super::product::Product;

/// Ordered collection of line items keyed by product id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from line items, folding duplicate product ids into
    /// the first occurrence (quantities summed, clamped to stock).
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            cart.absorb(item);
        }
        cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| i.product_id() == product_id)
    }

    fn get_mut(&mut self, product_id: ProductId) -> Option<&mut CartLineItem> {
        self.items.iter_mut().find(|i| i.product_id() == product_id)
    }

    /// Quantity of `product_id` in the cart, 0 if absent.
    #[must_use]
    pub fn item_quantity(&self, product_id: ProductId) -> u32 {
        self.get(product_id).map_or(0, CartLineItem::quantity)
    }

    /// Add `quantity` units of `product`.
    ///
    /// An existing line grows to `min(existing + quantity, stock)`; a new
    /// line is inserted with `min(quantity, stock)`. Out-of-stock products
    /// and zero quantities are silently ignored.
    ///
    /// Returns `true` if the cart changed.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> bool {
        if quantity == 0 || !product.in_stock() {
            return false;
        }

        if let Some(item) = self.get_mut(product.id) {
            let before = item.quantity();
            item.refresh_from(product);
            item.set_quantity_clamped(before.saturating_add(quantity));
            return item.quantity() != before;
        }

        match CartLineItem::new(product, quantity.min(product.stock)) {
            Ok(item) => {
                self.items.push(item);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove the line for `product_id`. Unknown ids are a no-op.
    ///
    /// Returns `true` if a line was removed.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id() != product_id);
        self.items.len() != before
    }

    /// Set the quantity of an existing line, clamped to `[1, stock]`.
    ///
    /// A quantity of zero or less removes the line. Unknown ids are a no-op.
    ///
    /// Returns `true` if the cart changed.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_item(product_id);
        }
        let Some(item) = self.get_mut(product_id) else {
            return false;
        };
        let before = item.quantity();
        item.set_quantity_clamped(u32::try_from(quantity).unwrap_or(u32::MAX));
        item.quantity() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Merge `other` into a copy of this cart by product id.
    ///
    /// Overlapping products get the summed quantity, clamped to the lower of
    /// the two stock limits; disjoint products are appended after this
    /// cart's lines, in `other`'s order. Line metadata (server item id,
    /// price, title) is taken from `self`.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for item in &other.items {
            merged.absorb(item.clone());
        }
        merged
    }

    fn absorb(&mut self, item: CartLineItem) {
        match self.get_mut(item.product_id()) {
            Some(existing) => {
                existing.restrict_stock(item.stock_limit());
                let sum = existing.quantity().saturating_add(item.quantity());
                existing.set_quantity_clamped(sum);
            }
            None => self.items.push(item),
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(CartLineItem::quantity).sum()
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn subtotal(&self, currency: CurrencyCode) -> Price {
        self.items
            .iter()
            .fold(Price::zero(currency), |acc, item| acc.plus(item.line_total()))
    }

    /// Whether any line needs paid shipping.
    #[must_use]
    pub fn has_paid_shipping(&self) -> bool {
        self.items.iter().any(|i| !i.free_shipping())
    }
}

/// Flat-fee shipping: charged once when at least one line lacks free shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub flat_fee: Price,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Price::from_minor_units(250_000, CurrencyCode::ARS),
        }
    }
}

impl ShippingPolicy {
    #[must_use]
    pub const fn new(flat_fee: Price) -> Self {
        Self { flat_fee }
    }

    /// Shipping cost for `cart`.
    #[must_use]
    pub fn cost_for(&self, cart: &Cart) -> Price {
        if cart.has_paid_shipping() {
            self.flat_fee
        } else {
            Price::zero(self.flat_fee.currency_code)
        }
    }

    /// Subtotal plus shipping.
    #[must_use]
    pub fn total_for(&self, cart: &Cart) -> Price {
        cart.subtotal(self.flat_fee.currency_code)
            .plus(self.cost_for(cart))
    }
}
