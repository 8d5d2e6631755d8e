//! Command implementations.

pub mod cart;
pub mod migrate;
pub mod stock;

use sqlx::PgPool;
use thiserror::Error;

use veloure_cart::db::{RepositoryError, create_pool};
use veloure_cart::{CartConfig, CartError, ConfigError, StockError};
use veloure_core::ProductId;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// Connect to the catalog database named by the configuration.
async fn connect(config: &CartConfig) -> Result<PgPool, CliError> {
    let database_url = config.require_database_url()?;

    tracing::info!("Connecting to catalog database...");
    Ok(create_pool(database_url).await?)
}
