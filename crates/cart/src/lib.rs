//! Veloure Cart - Inventory reservation protocol.
//!
//! The cart lives on the client; stock lives in a shared ledger. This crate
//! keeps the two consistent with optimistic concurrency: every stock change is
//! a compare-and-swap against the last observed counter, retried a bounded
//! number of times, with a local-only fallback when the caller may read the
//! ledger but not write to it.
//!
//! # Architecture
//!
//! - [`ledger`] - The `StockLedger` contract plus Postgres and in-memory adapters
//! - [`reservation`] - The reserve/release retry loop
//! - [`store`] - Persisted cart storage (`CartStore`)
//! - [`events`] - "cart changed" / "line added" notifications
//! - [`service`] - The cart mutation façade (`CartService`)
//! - [`config`] - Environment configuration
//! - [`db`] - `PostgreSQL` pool and product repository
//!
//! # Example
//!
//! ```rust,ignore
//! use veloure_cart::{CartService, MemoryCartStore, MemoryStockLedger, RetryPolicy};
//!
//! let ledger = MemoryStockLedger::new();
//! ledger.insert(product.id, 5).await;
//!
//! let mut cart = CartService::new(ledger, MemoryCartStore::new(), RetryPolicy::default());
//! let outcome = cart.add_to_cart(&product, 3, AddOptions::default()).await?;
//! assert_eq!(outcome.added_qty, 3);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ledger;
pub mod reservation;
pub mod service;
pub mod store;

pub use config::{CartConfig, ConfigError};
pub use error::CartError;
pub use events::{CartEvent, CartEvents};
pub use ledger::{CasOutcome, LedgerError, MemoryStockLedger, PgStockLedger, StockLedger};
pub use reservation::{ReleaseOutcome, ReservationEngine, ReserveOutcome, RetryPolicy, StockError};
pub use service::{AddOptions, AddOutcome, CartService, UpdateOutcome};
pub use store::{CartStore, JsonFileCartStore, MemoryCartStore, StoreError};
