//! Mercado Cart synchronization engine.
//!
//! Keeps a shopping cart consistent across the in-memory store the UI reads,
//! a local key-value store for anonymous visitors, and the remote cart
//! service for logged-in users.
//!
//! # Modules
//!
//! - [`store`] - Observable cart state and the reducer
//! - [`local`] - Per-owner local persistence
//! - [`remote`] - Remote cart service client
//! - [`session`] - Pending add-to-cart intents parked across login
//! - [`engine`] - Mutations with tentative apply and remote confirmation
//! - [`reconcile`] - Guest-to-user merge on identity changes
//! - [`summary`] - Derived totals and stock helpers for rendering

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod engine;
pub mod error;
pub mod local;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod store;
pub mod summary;

pub use config::{CartConfig, FallbackPolicy, RemoteConfig};
pub use engine::{CartEngine, MutationOutcome};
pub use error::{CartError, Result};
pub use reconcile::{IntentOutcome, ReconcileReport};
pub use summary::CartSummary;
