//! Product repository.
//!
//! Reads the catalog snapshot the cart needs when adding a product, and
//! gives operators an unconditional restock. A reservation racing a restock
//! loses its compare-and-swap and re-reads the new value.

use rust_decimal::Decimal;
use sqlx::PgPool;

use veloure_core::{CurrencyCode, Price, ProductId, ProductSnapshot};

use super::RepositoryError;

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Decimal,
    currency_code: String,
    image_ref: Option<String>,
    stock: Option<i32>,
}

impl TryFrom<ProductRow> for ProductSnapshot {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let currency_code = row.currency_code.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;
        let stock = row
            .stock
            .map(u32::try_from)
            .transpose()
            .map_err(|_| {
                RepositoryError::DataCorruption(format!("product {}: negative stock", row.id))
            })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: Price::new(row.price, currency_code),
            image_ref: row.image_ref,
            stock,
        })
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product snapshot by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row holds invalid data.
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, currency_code, image_ref, stock
            FROM catalog.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(ProductSnapshot::try_from).transpose()
    }

    /// Overwrite a product's stock counter.
    ///
    /// `None` stops tracking stock for the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::DataCorruption` if `stock` exceeds the column range.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_stock(&self, id: ProductId, stock: Option<u32>) -> Result<(), RepositoryError> {
        let stock = stock
            .map(i32::try_from)
            .transpose()
            .map_err(|_| RepositoryError::DataCorruption("stock exceeds column range".to_owned()))?;

        let result = sqlx::query(
            r"
            UPDATE catalog.product
            SET stock = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(stock)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(currency_code: &str, stock: Option<i32>) -> ProductRow {
        ProductRow {
            id: 3,
            name: "Silk Scarf".to_string(),
            price: Decimal::new(4500, 2),
            currency_code: currency_code.to_string(),
            image_ref: Some("scarf.jpg".to_string()),
            stock,
        }
    }

    #[test]
    fn test_row_conversion() {
        let product = ProductSnapshot::try_from(row("USD", Some(8))).unwrap();
        assert_eq!(product.id, ProductId::new(3));
        assert_eq!(product.stock, Some(8));
        assert_eq!(product.price.currency_code, CurrencyCode::USD);
    }

    #[test]
    fn test_row_conversion_untracked() {
        let product = ProductSnapshot::try_from(row("EUR", None)).unwrap();
        assert!(!product.tracks_stock());
    }

    #[test]
    fn test_row_conversion_rejects_bad_data() {
        assert!(matches!(
            ProductSnapshot::try_from(row("ZZZ", Some(1))),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            ProductSnapshot::try_from(row("USD", Some(-1))),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
