//! Remote snapshot to cart conversion.

use mercado_cart_core::{
    Cart, CartLineItem, CurrencyCode, DEFAULT_STOCK_LIMIT, LineItemRecord, Price,
};
use tracing::warn;

use super::types::{RemoteCart, RemoteCartItem};

impl RemoteCart {
    /// Convert into a [`Cart`], keeping the service's line order.
    ///
    /// Missing or zero stock is read as [`DEFAULT_STOCK_LIMIT`]. Lines with a
    /// zero quantity are dropped; quantities above stock are clamped.
    #[must_use]
    pub fn into_cart(self, currency: CurrencyCode) -> Cart {
        Cart::from_items(
            self.items
                .into_iter()
                .filter_map(|item| convert_item(item, currency)),
        )
    }
}

fn convert_item(item: RemoteCartItem, currency: CurrencyCode) -> Option<CartLineItem> {
    let stock_limit = item.stock.filter(|s| *s > 0).unwrap_or(DEFAULT_STOCK_LIMIT);
    if item.quantity > stock_limit {
        warn!(
            product_id = %item.product_id,
            quantity = item.quantity,
            stock = stock_limit,
            "Remote line exceeds stock, clamping"
        );
    }

    let record = LineItemRecord {
        product_id: item.product_id,
        item_id: item.id,
        title: item.title.unwrap_or_default(),
        unit_price: Price::from_minor_units(item.unit_price, currency),
        quantity: item.quantity.min(stock_limit),
        stock_limit,
        free_shipping: item.free_shipping.unwrap_or(false),
        seller_nickname: item
            .seller_nickname
            .unwrap_or_else(|| "Vendedor".to_string()),
        thumbnail: item.image_url,
    };

    match CartLineItem::try_from(record) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!(product_id = %item.product_id, error = %e, "Dropping invalid remote line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use mercado_cart_core::{CartItemId, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn item(product: i64, quantity: u32, stock: Option<u32>) -> RemoteCartItem {
        RemoteCartItem {
            id: Some(CartItemId::new(product * 10)),
            product_id: ProductId::new(product),
            title: Some(format!("Producto {product}")),
            image_url: None,
            unit_price: 150_050,
            quantity,
            stock,
            free_shipping: None,
            seller_nickname: None,
            seller_reputation: None,
        }
    }

    #[test]
    fn test_into_cart_converts_prices_and_ids() {
        let remote = RemoteCart {
            items: vec![item(1, 2, Some(5))],
            ..RemoteCart::default()
        };
        let cart = remote.into_cart(CurrencyCode::ARS);
        let line = cart.get(ProductId::new(1)).expect("line present");
        assert_eq!(line.item_id(), Some(CartItemId::new(10)));
        assert_eq!(line.unit_price().amount, "1500.50".parse::<Decimal>().expect("decimal"));
        assert_eq!(line.seller_nickname(), "Vendedor");
        assert!(!line.free_shipping());
    }

    #[test]
    fn test_into_cart_defaults_missing_stock() {
        let remote = RemoteCart {
            items: vec![item(1, 3, None), item(2, 1, Some(0))],
            ..RemoteCart::default()
        };
        let cart = remote.into_cart(CurrencyCode::ARS);
        for line in cart.items() {
            assert_eq!(line.stock_limit(), DEFAULT_STOCK_LIMIT);
        }
    }

    #[test]
    fn test_into_cart_drops_zero_and_clamps_excess() {
        let remote = RemoteCart {
            items: vec![item(1, 0, Some(5)), item(2, 9, Some(4))],
            ..RemoteCart::default()
        };
        let cart = remote.into_cart(CurrencyCode::ARS);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.item_quantity(ProductId::new(2)), 4);
    }
}
