//! Core types for Mercado Cart.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod intent;
pub mod line_item;
pub mod owner;
pub mod price;
pub mod product;

pub use cart::{Cart, ShippingPolicy};
pub use id::*;
pub use intent::PendingIntent;
pub use line_item::{CartLineItem, DEFAULT_STOCK_LIMIT, LineItemError, LineItemRecord};
pub use owner::{CartOwnerKey, Identity};
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use product::Product;
