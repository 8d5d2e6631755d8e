//! `PostgreSQL` stock ledger.
//!
//! The counter is `catalog.product.stock`. The conditional write is a single
//! `UPDATE ... WHERE id = $1 AND stock = $2`, so the database's row-level
//! atomicity decides every race. Zero affected rows means the caller lost.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use veloure_core::ProductId;

use super::{CasOutcome, LedgerError, StockLedger};

/// SQLSTATE for `insufficient_privilege`, raised for missing grants and for
/// row-level security violations.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Stock ledger backed by the catalog database.
#[derive(Debug, Clone)]
pub struct PgStockLedger {
    pool: PgPool,
}

impl PgStockLedger {
    /// Create a ledger over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StockLedger for PgStockLedger {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn read_stock(&self, id: ProductId) -> Result<u32, LedgerError> {
        let row = sqlx::query_scalar::<_, Option<i32>>(
            r"
            SELECT stock
            FROM catalog.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        match row {
            Some(stock) => Ok(stock_from_column(stock)),
            None => Err(LedgerError::NotFound(id)),
        }
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn conditional_set_stock(
        &self,
        id: ProductId,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome, LedgerError> {
        let expected = to_column(expected)?;
        let new = to_column(new)?;

        let row = sqlx::query_scalar::<_, Option<i32>>(
            r"
            UPDATE catalog.product
            SET stock = $3, updated_at = now()
            WHERE id = $1 AND stock = $2
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        Ok(row.map_or(CasOutcome::NoMatch, |stock| {
            CasOutcome::Applied(stock_from_column(stock))
        }))
    }
}

/// NULL and negative values read as zero.
fn stock_from_column(stock: Option<i32>) -> u32 {
    stock.map_or(0, |value| u32::try_from(value).unwrap_or(0))
}

fn to_column(stock: u32) -> Result<i32, LedgerError> {
    i32::try_from(stock)
        .map_err(|_| LedgerError::Backend(format!("stock value {stock} exceeds column range")))
}

/// Map a database error onto the ledger taxonomy.
///
/// The SQLSTATE is authoritative; message text is the fallback for drivers
/// and proxies that rewrap errors without a code.
fn classify(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE)
    {
        return LedgerError::PolicyDenied(db_err.message().to_owned());
    }
    LedgerError::from_message(err.to_string())
}
