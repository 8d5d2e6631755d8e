//! Cart façade error type.
//!
//! Stock outcomes (exhaustion, conflicts, ledger failures) are reported as
//! values inside the operation's outcome. Only a failure to persist the cart
//! is an `Err`.

use thiserror::Error;

use crate::store::StoreError;

/// Error returned by [`CartService`](crate::CartService) operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart could not be loaded or saved.
    #[error("Cart storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
