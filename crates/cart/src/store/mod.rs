//! Persisted cart storage.
//!
//! A store holds exactly one session's cart and replaces it wholesale on
//! every save. Stores are synchronous; they never talk to the ledger.
//!
//! # Stores
//!
//! - [`MemoryCartStore`] - process memory, for tests and embedding
//! - [`JsonFileCartStore`] - a JSON document on local disk

mod file;
mod memory;

use thiserror::Error;

use veloure_core::Cart;

pub use file::JsonFileCartStore;
pub use memory::MemoryCartStore;

/// Errors that can occur while persisting a cart.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("cart storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cart could not be encoded.
    #[error("cart serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Storage for a single session's cart.
pub trait CartStore: Send {
    /// Load the cart.
    ///
    /// Missing or unreadable data loads as an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only when the storage itself cannot be accessed.
    fn load(&self) -> Result<Cart, StoreError>;

    /// Replace the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the cart could not be written.
    fn save(&mut self, cart: &Cart) -> Result<(), StoreError>;
}
