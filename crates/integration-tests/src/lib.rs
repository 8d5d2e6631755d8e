//! Integration tests for the Veloure cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p veloure-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `reservation_scenarios` - End-to-end cart flows against a shared ledger
//! - `concurrency` - Several sessions racing for the same stock
//! - `properties` - Guarantees that hold for every input
//!
//! Every test runs against [`MemoryStockLedger`], shared between sessions
//! through an `Arc` the way carts share the catalog database.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use veloure_cart::{CartService, LedgerError, MemoryCartStore, MemoryStockLedger, RetryPolicy};
use veloure_core::{CurrencyCode, Price, ProductId, ProductSnapshot};

/// A shopper session over the shared in-memory ledger.
pub type Session = CartService<Arc<MemoryStockLedger>, MemoryCartStore>;

/// Build a product snapshot priced at $25.00.
#[must_use]
pub fn product(id: i32, name: &str, stock: Option<u32>) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: name.to_string(),
        price: Price::new(Decimal::new(2500, 2), CurrencyCode::USD),
        image_ref: None,
        stock,
    }
}

/// A ledger seeded with the stock of each tracked product.
pub async fn ledger_with(products: &[&ProductSnapshot]) -> Arc<MemoryStockLedger> {
    let ledger = Arc::new(MemoryStockLedger::new());
    for product in products {
        if let Some(stock) = product.stock {
            ledger.insert(product.id, stock).await;
        }
    }
    ledger
}

/// Retry policy with a short call timeout so stalled-ledger tests finish fast.
#[must_use]
pub const fn test_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        call_timeout: Duration::from_secs(1),
        base_backoff: Duration::ZERO,
    }
}

/// Open a session with an empty cart.
#[must_use]
pub fn session(ledger: &Arc<MemoryStockLedger>) -> Session {
    CartService::new(Arc::clone(ledger), MemoryCartStore::new(), test_policy())
}

/// The error Postgres reports when row-level security rejects an update.
#[must_use]
pub fn rls_denial() -> LedgerError {
    LedgerError::from_message("new row violates row-level security policy for table \"product\"")
}
