//! Database operations for the marketplace `PostgreSQL` schema.
//!
//! ## Tables (schema `marketplace`)
//!
//! - `users` - Every account, with the profile image columns
//! - `store_profiles` - Store owner payload, ratings, sales counters, logo
//! - `products` - Catalog, with view/sales counters and rating summary
//! - `product_ratings` - One rating per customer per product
//! - `product_images` - Product galleries, one primary image each
//! - `comments` - Product comments and replies
//! - `carts` / `cart_items` - One cart per customer
//! - `wishlists` / `wishlist_items` - One wishlist per customer
//! - `orders` / `order_items` - Orders created at checkout
//!
//! Sessions live in `tower_sessions.session`.
//!
//! Read-modify-write operations lock the owning row with `SELECT … FOR UPDATE`
//! inside a transaction and run the core routine on the locked state, so
//! concurrent writers to one entity are serialized.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p marketplace-cli -- migrate
//! ```

pub mod carts;
pub mod comments;
pub mod images;
pub mod orders;
pub mod product_images;
pub mod products;
pub mod users;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use marketplace_core::model::{CheckoutError, InvalidTransition};
use marketplace_core::{AggregateError, ValidationError};

pub use carts::CartRepository;
pub use comments::CommentRepository;
pub use images::{ImageRepository, ImageTarget};
pub use orders::{OrderRepository, OrderScope};
pub use product_images::ProductImageRepository;
pub use products::{
    CategoryCount, ProductFilter, ProductRepository, ProductSort, StoreCatalogStats,
};
pub use users::{RatedAspect, UserRepository};
pub use wishlists::WishlistRepository;

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

    /// Constraint violation (e.g., duplicate phone or SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A core aggregate rejected its input.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// An entity rule rejected the change.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The cart cannot be turned into orders.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The order lifecycle does not allow the change.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign-key violation to `Conflict`, anything else to `Database`.
    pub(crate) fn referenced(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
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

/// Convert a stored `INTEGER` that must be non-negative.
pub(crate) fn non_negative_u32(field: &str, value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {field}: {value}")))
}

/// Convert a stored `BIGINT` counter.
pub(crate) fn non_negative_u64(field: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {field}: {value}")))
}

/// Convert a value about to be written into an `INTEGER` column.
pub(crate) fn to_i32(field: &'static str, value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| {
        RepositoryError::Validation(ValidationError::field(
            field,
            format!("must be at most {}", i32::MAX),
        ))
    })
}

/// Convert a counter about to be written into a `BIGINT` column.
pub(crate) fn to_i64(field: &'static str, value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| {
        RepositoryError::Validation(ValidationError::field(
            field,
            format!("must be at most {}", i64::MAX),
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_conversions() {
        assert_eq!(non_negative_u32("stock", 7).unwrap(), 7);
        assert!(matches!(
            non_negative_u32("stock", -1),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert_eq!(to_i32("stock", 12).unwrap(), 12);
        assert!(matches!(
            to_i32("stock", u32::MAX),
            Err(RepositoryError::Validation(_))
        ));
        assert!(to_i64("views", u64::MAX).is_err());
        assert_eq!(non_negative_u64("views", 3).unwrap(), 3);
    }
}
