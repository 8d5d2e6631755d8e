//! Stock management commands.
//!
//! `set` is an unconditional operator write. Reservations in flight lose
//! their compare-and-swap against it and re-read the new level.

use veloure_cart::CartConfig;
use veloure_cart::db::{ProductRepository, RepositoryError};
use veloure_core::ProductId;

use super::{CliError, connect};

/// Print a product and its stock counter.
///
/// # Errors
///
/// Returns `CliError::ProductNotFound` if the product doesn't exist.
pub async fn show(config: &CartConfig, id: ProductId) -> Result<(), CliError> {
    let pool = connect(config).await?;
    let product = ProductRepository::new(&pool)
        .get(id)
        .await?
        .ok_or(CliError::ProductNotFound(id))?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{} {} ({} {})",
            product.id,
            product.name,
            product.price,
            product.price.currency_code.code()
        );
        match product.stock {
            Some(stock) => println!("  stock: {stock}"),
            None => println!("  stock: not tracked"),
        }
    }
    Ok(())
}

/// Overwrite a product's stock counter. `None` stops tracking stock.
///
/// # Errors
///
/// Returns `CliError::ProductNotFound` if the product doesn't exist.
pub async fn set(config: &CartConfig, id: ProductId, stock: Option<u32>) -> Result<(), CliError> {
    let pool = connect(config).await?;

    match ProductRepository::new(&pool).set_stock(id, stock).await {
        Ok(()) => {}
        Err(RepositoryError::NotFound) => {
            return Err(CliError::ProductNotFound(id));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(product_id = %id, ?stock, "Stock level overwritten");
    Ok(())
}
