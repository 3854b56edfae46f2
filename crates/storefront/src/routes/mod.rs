//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                  - Home page
//!
//! # Products
//! GET  /products                          - Product listing (?category, ?q, ?page)
//! GET  /products/{slug}                   - Product detail
//!
//! # Cart (form posts, HTMX-aware)
//! GET  /cart                              - Cart page
//! POST /cart/add                          - Add to cart
//! POST /cart/update                       - Set line quantity
//! POST /cart/remove                       - Remove line
//! GET  /cart/count                        - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout                          - Checkout form
//! POST /checkout                          - Create order, redirect to the gateway
//! GET  /checkout/success|failure|pending  - Gateway return pages
//!
//! # Content
//! GET  /blog                              - Blog index (?tag)
//! GET  /blog/{slug}                       - Blog post
//! GET  /pages/{slug}                      - CMS page
//!
//! # Auth
//! GET  /auth/login                        - Login page
//! POST /auth/login                        - Login action
//! GET  /auth/register                     - Register page
//! POST /auth/register                     - Register action
//! POST /auth/logout                       - Logout action
//!
//! # Account (requires auth)
//! GET  /account                           - Orders and membership status
//! GET  /account/orders/{number}           - Order detail
//!
//! # Membership
//! GET  /membership                        - Modules and lessons
//! GET  /membership/{module}/{lesson}      - Lesson
//! POST /membership/{module}/{lesson}/complete - Mark lesson complete
//!
//! # Webhooks
//! POST /api/webhooks/payments             - Payment gateway notifications
//! ```

pub mod account;
pub mod auth;
pub mod blog;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod membership;
pub mod pages;
pub mod products;
pub mod webhooks;

use std::convert::Infallible;

use axum::{
    Router,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
    routing::{get, post},
};
use solenne_core::settings::StoreSettings;
use tower_sessions::Session;

use crate::middleware::{CspNonce, OptionalAuth, api_rate_limiter, auth_rate_limiter};
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// Data every full page needs for the layout: nonce, header and cart badge.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub nonce: String,
    pub customer: Option<CurrentCustomer>,
    pub cart_count: u32,
    pub store_name: String,
}

impl PageContext {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.customer.is_some()
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;
        let OptionalAuth(customer) = OptionalAuth::from_request_parts(parts, state).await?;

        let cart_count = match parts.extensions.get::<Session>() {
            Some(session) => cart::load_cart(session).await.item_count(),
            None => 0,
        };

        let store_name = match state.settings().get(state.pool()).await {
            Ok(settings) => settings.store_name,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load store settings for page");
                StoreSettings::default().store_name
            }
        };

        Ok(Self {
            nonce,
            customer,
            cart_count,
            store_name,
        })
    }
}

/// Whether the request was sent by the cart script rather than a plain form.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|value| value.as_bytes() == b"true")
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route_layer(api_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::submit))
        .route("/success", get(checkout::success))
        .route("/failure", get(checkout::failure))
        .route("/pending", get(checkout::pending))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .route_layer(auth_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders/{number}", get(account::order))
}

/// Create the membership routes router.
pub fn membership_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(membership::index))
        .route("/{module}/{lesson}", get(membership::lesson))
        .route("/{module}/{lesson}/complete", post(membership::complete))
}

/// Create the content routes router.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/blog", get(blog::index))
        .route("/blog/{slug}", get(blog::show))
        .route("/pages/{slug}", get(pages::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .nest("/membership", membership_routes())
        .merge(content_routes())
        .route("/api/webhooks/payments", post(webhooks::payment_notification))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_is_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("hx-request", HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
        headers.insert("hx-request", HeaderValue::from_static("false"));
        assert!(!is_htmx(&headers));
    }
}
