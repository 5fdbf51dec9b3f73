//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! bc-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BAKERY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection
//!   string
//!
//! Migration files live in `crates/backend/migrations/` and are embedded
//! into the binary at compile time.

use butter_crumb_backend::config::{BackendConfig, ConfigError};
use butter_crumb_backend::db;

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending database migrations.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let config = BackendConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../backend/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
