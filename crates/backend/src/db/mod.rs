//! Database operations for the bakery `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `categories`, `products`, `product_images` - Catalog reference data
//! - `carts`, `cart_items` - Per-user / per-guest-session carts
//! - `addresses` - Stored user addresses
//! - `orders`, `order_items` - Immutable order snapshots
//! - `reviews` - Customer reviews
//! - `promo_codes` - Discount codes
//! - `settings` - Business settings (JSONB)
//!
//! Queries use the runtime `sqlx` API with [`sqlx::FromRow`] row types
//! converted into the domain types of [`crate::models`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/backend/migrations/` and run via:
//! ```bash
//! cargo run -p butter-crumb-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod categories;
pub mod orders;
pub mod products;
pub mod promo_codes;
pub mod reviews;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use promo_codes::PromoCodeRepository;
pub use reviews::ReviewRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug or sku).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
