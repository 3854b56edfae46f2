//! Shared helpers for end-to-end tests.
//!
//! The tests talk to running servers over HTTP and are `#[ignore]`d by
//! default:
//!
//! ```bash
//! cargo run -p solenne-storefront &
//! cargo run -p solenne-admin &
//! cargo test -p solenne-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - default `http://localhost:3000`
//! - `ADMIN_BASE_URL` - default `http://localhost:3001`
//! - `ADMIN_TEST_EMAIL`, `ADMIN_TEST_PASSWORD` - an existing admin account
//!   (see `solenne-cli admin create`)
//! - `DATABASE_URL` - a migrated database for the order fulfilment tests,
//!   which write their own fixtures and need no running server

use reqwest::{Client, StatusCode, redirect};
use sqlx::PgPool;

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL of the admin panel under test.
#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// Client with a cookie jar that does not follow redirects, so tests can
/// assert on `Location` headers.
///
/// # Panics
///
/// Panics if the TLS backend fails to initialise.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Log in to the admin panel with the test account.
///
/// # Panics
///
/// Panics if the credentials are not configured or the login is refused.
#[allow(clippy::expect_used)]
pub async fn admin_client() -> Client {
    let email = std::env::var("ADMIN_TEST_EMAIL").expect("ADMIN_TEST_EMAIL not set");
    let password = std::env::var("ADMIN_TEST_PASSWORD").expect("ADMIN_TEST_PASSWORD not set");

    let client = client();
    let resp = client
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", email.as_str()), ("password", password.as_str())])
        .send()
        .await
        .expect("Failed to reach admin login");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER, "admin login refused");
    client
}

/// The `Location` header of a redirect response.
#[must_use]
pub fn location(resp: &reqwest::Response) -> Option<&str> {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Connect to the database named by `DATABASE_URL`.
///
/// # Panics
///
/// Panics if the variable is not set or the connection fails.
#[allow(clippy::expect_used)]
pub async fn database_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to DATABASE_URL")
}
