//! Database operations for the storefront.
//!
//! # Schemas
//!
//! - `shop.categories`, `shop.products` - Catalog
//! - `shop.customers` - Buyers (guest and registered)
//! - `shop.orders`, `shop.order_items`, `shop.payments`,
//!   `shop.order_status_history` - Orders and their payment trail
//! - `shop.membership_modules`, `shop.lessons`, `shop.subscriptions`,
//!   `shop.lesson_progress` - Membership program
//! - `shop.settings` - Store settings edited in the back-office
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p solenne-cli -- migrate
//! ```

pub mod catalog;
pub mod customers;
pub mod membership;
pub mod orders;
pub mod settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use solenne_core::fulfilment::FulfilmentError;

pub use catalog::CatalogRepository;
pub use customers::CustomerRepository;
pub use membership::MembershipRepository;
pub use orders::OrderRepository;
pub use settings::SettingsRepository;

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

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<FulfilmentError> for RepositoryError {
    fn from(err: FulfilmentError) -> Self {
        match err {
            FulfilmentError::Database(e) => Self::Database(e),
            FulfilmentError::DataCorruption(msg) => Self::DataCorruption(msg),
        }
    }
}

impl RepositoryError {
    /// Map unique violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
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

/// Zero-based offset for a one-based page number.
#[must_use]
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(per_page)
}

/// Escape `%` and `_` so user input matches literally inside `ILIKE`.
#[must_use]
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0, 24), 0);
        assert_eq!(page_offset(1, 24), 0);
        assert_eq!(page_offset(3, 24), 48);
    }

    #[test]
    fn test_fulfilment_error_keeps_kind() {
        let err = RepositoryError::from(FulfilmentError::DataCorruption(
            "membership days out of range: -30".into(),
        ));
        assert!(matches!(err, RepositoryError::DataCorruption(ref msg) if msg.ends_with("-30")));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" serum "), "%serum%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
