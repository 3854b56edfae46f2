//! Database operations for the back-office.
//!
//! The admin binary shares the storefront database:
//!
//! - `admin.admin_users` - Back-office accounts
//! - `admin.session` - Admin sessions (created by the session store)
//! - `shop.*` - Catalog, customers, orders, membership and settings
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p solenne-cli -- migrate
//! ```

pub mod admin_users;
pub mod analytics;
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

pub use admin_users::AdminUserRepository;
pub use analytics::AnalyticsRepository;
pub use catalog::CatalogRepository;
pub use customers::CustomerRepository;
pub use membership::MembershipRepository;
pub use orders::OrderRepository;
pub use settings::SettingsRepository;

/// Rows per page on back-office lists.
pub const PER_PAGE: u32 = 25;

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
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(format!("{what} is still referenced"));
            }
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
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Zero-based offset for a one-based page number.
#[must_use]
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(per_page)
}

/// Number of pages needed for `total` rows; at least one.
#[must_use]
pub fn page_count(total: i64, per_page: u32) -> u32 {
    let per_page = i64::from(per_page.max(1));
    let pages = (total.max(0) + per_page - 1) / per_page;
    u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
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

/// A page of rows plus the total across all pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(rows: Vec<T>, total: i64, page: u32) -> Self {
        Self {
            rows,
            total,
            page: page.max(1),
            pages: page_count(total, PER_PAGE),
        }
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0, PER_PAGE), 0);
        assert_eq!(page_offset(1, PER_PAGE), 0);
        assert_eq!(page_offset(4, PER_PAGE), 75);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 25), 1);
        assert_eq!(page_count(25, 25), 1);
        assert_eq!(page_count(26, 25), 2);
    }

    #[test]
    fn test_page_navigation() {
        let page = Page::new(vec![1, 2, 3], 60, 2);
        assert_eq!(page.pages, 3);
        assert!(page.has_previous());
        assert!(page.has_next());

        let last = Page::new(Vec::<i32>::new(), 60, 3);
        assert!(!last.has_next());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("SOL-2026"), "%SOL-2026%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
    }
}
