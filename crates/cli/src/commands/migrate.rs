//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! veloure migrate
//! ```
//!
//! # Environment Variables
//!
//! - `VELOURE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Catalog migrations: `crates/cart/migrations/`

use veloure_cart::CartConfig;

use super::{CliError, connect};

/// Run catalog database migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run(config: &CartConfig) -> Result<(), CliError> {
    let pool = connect(config).await?;

    tracing::info!("Running catalog migrations...");
    sqlx::migrate!("../cart/migrations").run(&pool).await?;

    tracing::info!("Catalog migrations complete!");
    Ok(())
}
