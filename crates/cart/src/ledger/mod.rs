//! Remote stock ledger contract.
//!
//! The ledger owns one remaining-stock counter per product. This crate only
//! depends on two operations: read the counter, and write a new value if and
//! only if the counter still holds the value the caller last observed.
//!
//! # Adapters
//!
//! - [`PgStockLedger`] - `catalog.product.stock` in `PostgreSQL`
//! - [`MemoryStockLedger`] - in-process counters with fault injection

mod memory;
mod postgres;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use veloure_core::ProductId;

pub use memory::MemoryStockLedger;
pub use postgres::PgStockLedger;

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write happened; carries the stored value.
    Applied(u32),
    /// The counter no longer held the expected value. Nothing was written.
    NoMatch,
}

/// Errors reported by a ledger adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The product has no ledger row.
    #[error("Product not found.")]
    NotFound(ProductId),

    /// The ledger's access-control layer rejected the call.
    #[error("{0}")]
    PolicyDenied(String),

    /// The ledger did not answer within the configured call timeout.
    #[error("Stock ledger did not respond within {0:?}")]
    Timeout(Duration),

    /// Any other ledger failure, message preserved verbatim.
    #[error("{0}")]
    Backend(String),
}

impl LedgerError {
    /// Classify a failure that is only available as text.
    ///
    /// Messages matching the policy-denial vocabulary become
    /// [`LedgerError::PolicyDenied`]; everything else is a backend error.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_policy_denial(&message) {
            Self::PolicyDenied(message)
        } else {
            Self::Backend(message)
        }
    }

    /// Whether the caller lacks write authority on the ledger.
    ///
    /// Backend errors are checked against the vocabulary as well, so an
    /// adapter that forgot to classify a denial still triggers the fallback.
    #[must_use]
    pub fn is_policy_denied(&self) -> bool {
        match self {
            Self::PolicyDenied(_) => true,
            Self::Backend(message) => is_policy_denial(message),
            Self::NotFound(_) | Self::Timeout(_) => false,
        }
    }
}

static POLICY_DENIAL: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Literal pattern, covered by tests
    Regex::new(
        r"(?i)permission|not allowed|row[- ]level security|\brls\b|\bjwt\b|authoriz|authenticat|polic(y|ies)|credential|token",
    )
    .expect("policy denial pattern is valid")
});

/// Whether an error message describes an access-control rejection.
#[must_use]
pub fn is_policy_denial(message: &str) -> bool {
    POLICY_DENIAL.is_match(message)
}

/// The remote stock ledger.
///
/// Implementations must make `conditional_set_stock` atomic with respect to
/// every other writer; the reservation engine relies on it and takes no locks
/// of its own.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Read the product's remaining stock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the product has no ledger row.
    async fn read_stock(&self, id: ProductId) -> Result<u32, LedgerError>;

    /// Set the counter to `new` if it currently equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the write could not be attempted. A lost race
    /// is not an error: it is `Ok(CasOutcome::NoMatch)`.
    async fn conditional_set_stock(
        &self,
        id: ProductId,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome, LedgerError>;
}

#[async_trait]
impl<L: StockLedger + ?Sized> StockLedger for Arc<L> {
    async fn read_stock(&self, id: ProductId) -> Result<u32, LedgerError> {
        (**self).read_stock(id).await
    }

    async fn conditional_set_stock(
        &self,
        id: ProductId,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome, LedgerError> {
        (**self).conditional_set_stock(id, expected, new).await
    }
}
