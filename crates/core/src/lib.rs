//! Mercado Cart Core - Shared cart types library.
//!
//! This crate provides the types shared by all Mercado Cart components:
//! - `sync` - Cart store, persistence and reconciliation engine
//! - `cli` - Command-line driver for the engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage
//! access, no HTTP clients. Every cart invariant (unique product ids,
//! `1 <= quantity <= stock`) is enforced here so that the engine can never
//! publish a cart that violates them.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, products, line items, carts, owners and intents

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
