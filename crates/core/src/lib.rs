//! Veloure Core - Shared cart and catalog types.
//!
//! This crate provides the domain types used by every Veloure component:
//! - `cart` - The inventory reservation protocol and cart façade
//! - `cli` - Operator tooling for migrations, stock and carts
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no ledger clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, prices, quantity normalization and cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
