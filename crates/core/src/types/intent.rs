//! Deferred add-to-cart requests.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// "User tried to add product X while unauthenticated."
///
/// Captured before redirecting to login and consumed exactly once by the
/// reconciliation that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIntent {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

impl PendingIntent {
    /// An intent to add a single unit.
    #[must_use]
    pub const fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: 1,
        }
    }

    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = if quantity == 0 { 1 } else { quantity };
        self
    }
}
