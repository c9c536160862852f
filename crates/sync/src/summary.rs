//! Read-only derived queries over a cart state, for rendering.

use mercado_cart_core::{Cart, CartLineItem, Price, Product, ProductId, ShippingPolicy};

use crate::store::CartState;

/// Snapshot of the cart plus the helpers UI components need.
#[derive(Debug, Clone)]
pub struct CartSummary {
    state: CartState,
    shipping: ShippingPolicy,
}

impl CartSummary {
    #[must_use]
    pub const fn new(state: CartState, shipping: ShippingPolicy) -> Self {
        Self { state, shipping }
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.state.cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        self.state.cart.items()
    }

    #[must_use]
    pub const fn loading(&self) -> bool {
        self.state.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Units of `product_id` in the cart, 0 if absent.
    #[must_use]
    pub fn item_quantity(&self, product_id: ProductId) -> u32 {
        self.state.cart.item_quantity(product_id)
    }

    /// Whether one more unit of `product` fits.
    #[must_use]
    pub fn can_add_to_cart(&self, product: &Product) -> bool {
        product.stock > 0 && self.item_quantity(product.id) < product.stock
    }

    /// Units of `product` that can still be added.
    #[must_use]
    pub fn available_stock(&self, product: &Product) -> u32 {
        product.stock.saturating_sub(self.item_quantity(product.id))
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.state
            .cart
            .subtotal(self.shipping.flat_fee.currency_code)
    }

    #[must_use]
    pub fn shipping_cost(&self) -> Price {
        self.shipping.cost_for(&self.state.cart)
    }

    #[must_use]
    pub fn total(&self) -> Price {
        self.shipping.total_for(&self.state.cart)
    }

    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.state.cart.total_items()
    }

    /// Locale-aware currency string.
    #[must_use]
    pub fn format_price(price: Price) -> String {
        price.display()
    }
}
