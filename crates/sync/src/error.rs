//! Unified error type for the cart engine.
//!
//! Cart operations themselves never fail outward: remote and storage errors
//! are logged, recorded in the store's error flag and answered with a
//! fallback. `CartError` covers the places where failing is the right answer,
//! such as building an engine from configuration.

use thiserror::Error;

use crate::config::ConfigError;
use crate::local::StorageError;
use crate::remote::RemoteError;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Remote cart service operation failed.
    #[error("Remote cart error: {0}")]
    Remote(#[from] RemoteError),

    /// Local storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
