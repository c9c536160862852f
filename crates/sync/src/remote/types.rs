//! Wire types of the remote cart service.
//!
//! Field names follow the service's camelCase JSON. The Spanish names used by
//! older deployments (`usuarioId`, `productoId`) are accepted as aliases.

use chrono::NaiveDateTime;
use mercado_cart_core::{CartId, CartItemId, ProductId};
use serde::{Deserialize, Serialize};

/// Cart snapshot returned by every remote call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCart {
    #[serde(default)]
    pub id: Option<CartId>,
    #[serde(default, alias = "usuarioId")]
    pub user_id: Option<RemoteOwnerId>,
    #[serde(default)]
    pub items: Vec<RemoteCartItem>,
    /// Total in minor units.
    #[serde(default)]
    pub total_price: Option<i64>,
    #[serde(default)]
    pub total_items: Option<i64>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

impl RemoteCart {
    /// Snapshot of an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Owner id as sent by the service (numeric or string keys both occur).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteOwnerId {
    Number(i64),
    Text(String),
}

/// One line of a remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartItem {
    /// Server-side line id.
    #[serde(default)]
    pub id: Option<CartItemId>,
    #[serde(alias = "productoId")]
    pub product_id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Unit price in minor units.
    #[serde(default)]
    pub unit_price: i64,
    pub quantity: u32,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub free_shipping: Option<bool>,
    #[serde(default)]
    pub seller_nickname: Option<String>,
    #[serde(default)]
    pub seller_reputation: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_service_snapshot() {
        let json = r#"{
            "id": 3,
            "usuarioId": 42,
            "items": [{
                "id": 11,
                "productoId": 7,
                "title": "Termo",
                "imageUrl": null,
                "unitPrice": 1250050,
                "quantity": 2,
                "stock": 4,
                "freeShipping": true,
                "sellerNickname": "ACME",
                "sellerReputation": "gold"
            }],
            "totalPrice": 2500100,
            "totalItems": 2,
            "createdAt": "2025-05-01T10:00:00.123",
            "updatedAt": null
        }"#;

        let cart: RemoteCart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.id, Some(CartId::new(3)));
        assert_eq!(cart.user_id, Some(RemoteOwnerId::Number(42)));
        assert_eq!(cart.items.len(), 1);
        let item = &cart.items[0];
        assert_eq!(item.product_id, ProductId::new(7));
        assert_eq!(item.id, Some(CartItemId::new(11)));
        assert_eq!(item.stock, Some(4));
        assert!(cart.created_at.is_some());
    }

    #[test]
    fn test_deserialize_minimal_snapshot() {
        let cart: RemoteCart =
            serde_json::from_str(r#"{"userId":"ana","items":[{"productId":1,"quantity":1}]}"#)
                .unwrap();
        assert_eq!(cart.user_id, Some(RemoteOwnerId::Text("ana".to_string())));
        assert_eq!(cart.items[0].unit_price, 0);
        assert!(cart.items[0].free_shipping.is_none());
    }
}
