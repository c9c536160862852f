//! Local key-value persistence for carts.
//!
//! Each [`CartOwnerKey`] owns one slot holding a JSON array of line items.
//! Malformed slots are discarded on load and the namespace starts over empty.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use mercado_cart_core::{Cart, CartLineItem, CartOwnerKey, LineItemRecord};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cart could not be serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A namespaced key-value slot store.
///
/// Methods are synchronous and are called from inside the engine's async
/// mutations. Implementations must be quick; [`FileStore`] does blocking
/// file I/O on small files, which suits a CLI or a current-thread runtime.
pub trait LocalStore: Send + Sync {
    /// Read the raw value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// FileStore
// =============================================================================

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store files under `dir`, created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` currently holds a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// Cart snapshots
// =============================================================================

/// Load the cart persisted for `owner`.
///
/// Never fails: unreadable slots yield an empty cart, malformed slots are
/// deleted, and entries with a non-positive quantity are skipped.
pub fn load_cart<S: LocalStore + ?Sized>(store: &S, owner: &CartOwnerKey) -> Cart {
    let key = owner.storage_key();
    let raw = match store.get(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Cart::new(),
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read local cart");
            return Cart::new();
        }
    };

    let records: Vec<LineItemRecord> = match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(key = %key, error = %e, "Discarding malformed local cart");
            if let Err(e) = store.remove(&key) {
                warn!(key = %key, error = %e, "Failed to remove malformed local cart");
            }
            return Cart::new();
        }
    };

    let items = records
        .into_iter()
        .filter(|r| r.quantity > 0)
        .filter_map(|mut record| {
            record.quantity = record.quantity.min(record.stock_limit.max(1));
            CartLineItem::try_from(record)
                .inspect_err(|e| debug!(key = %key, error = %e, "Skipping invalid local line"))
                .ok()
        });
    Cart::from_items(items)
}

/// Persist `cart` as the snapshot for `owner`.
///
/// # Errors
///
/// Returns `StorageError` if serialization or the write fails.
pub fn save_cart<S: LocalStore + ?Sized>(
    store: &S,
    owner: &CartOwnerKey,
    cart: &Cart,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(cart.items())?;
    store.set(&owner.storage_key(), &raw)
}

/// Delete the snapshot for `owner`.
///
/// # Errors
///
/// Returns `StorageError::Io` if the backing store cannot be written.
pub fn discard_cart<S: LocalStore + ?Sized>(
    store: &S,
    owner: &CartOwnerKey,
) -> Result<(), StorageError> {
    store.remove(&owner.storage_key())
}
