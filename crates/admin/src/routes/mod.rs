//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! GET  /auth/login                          - Login page
//! POST /auth/login                          - Password login
//! POST /auth/logout                         - Logout
//!
//! # Dashboard
//! GET  /                                    - Today, fulfilment queue, low stock
//!
//! # Orders
//! GET  /orders                              - Order listing (?status, ?q, ?page)
//! GET  /orders/{id}                         - Order detail
//! POST /orders/{id}/status                  - Move to another status
//!
//! # Catalog
//! GET  /products                            - Product listing (?category, ?active, ?q, ?page)
//! GET  /products/new, POST /products/new    - Create product
//! GET  /products/{id}/edit, POST ...        - Edit product
//! POST /products/{id}/toggle                - Activate/deactivate
//! POST /products/{id}/delete                - Delete unreferenced product
//! GET  /categories, POST /categories        - List/create categories
//! POST /categories/{id}/delete              - Delete empty category
//!
//! # Customers
//! GET  /customers                           - Customer listing (?q, ?page)
//! GET  /customers/{id}                      - Profile, orders, subscription
//! POST /customers/{id}/membership/grant     - Grant days
//! POST /customers/{id}/membership/revoke    - Cancel membership
//!
//! # Membership curriculum
//! GET  /membership                          - Modules
//! POST /membership/modules                  - Create module
//! GET  /membership/modules/{id}, POST ...   - Edit module, list lessons
//! POST /membership/modules/{id}/delete      - Delete module
//! GET  /membership/modules/{id}/lessons/new, POST ...        - Create lesson
//! GET  /membership/modules/{id}/lessons/{lesson}/edit, POST  - Edit lesson
//! POST /membership/modules/{id}/lessons/{lesson}/delete      - Delete lesson
//!
//! # Content (CMS)
//! GET  /blog                                - All posts, drafts included
//! GET  /blog/new, POST /blog/new            - Create draft
//! GET  /blog/{id}/edit, POST ...            - Edit post
//! POST /blog/{id}/publish|unpublish|delete
//! GET  /testimonials, POST /testimonials    - List/create testimonials
//! POST /testimonials/{id}/delete
//!
//! # Analytics
//! GET  /analytics                           - Report page (?range)
//! GET  /api/analytics                       - Report as JSON (?range)
//!
//! # Settings (writers)
//! GET  /settings, POST /settings
//!
//! # Admin Users (super admin only)
//! GET  /admin-users, POST /admin-users
//! POST /admin-users/{id}/delete
//! ```

pub mod admin_users;
pub mod analytics;
pub mod auth;
pub mod blog;
pub mod categories;
pub mod customers;
pub mod dashboard;
pub mod membership;
pub mod orders;
pub mod products;
pub mod settings;
pub mod testimonials;

use axum::{
    Router,
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::db::Page;
use crate::middleware::auth::{AdminAuthRejection, RequireAdminAuth};
use crate::models::{AdminRole, CurrentAdmin, session_keys};
use crate::state::AppState;

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
    pub is_super_admin: bool,
    pub can_write: bool,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            email: admin.email.to_string(),
            is_super_admin: admin.role == AdminRole::SuperAdmin,
            can_write: admin.role.can_write(),
        }
    }
}

/// What every back-office page needs: who is logged in, where they are,
/// and the notice left by the previous action.
///
/// Rejects like [`RequireAdminAuth`] when nobody is logged in.
#[derive(Debug, Clone)]
pub struct AdminPage {
    pub admin: CurrentAdmin,
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flash: Option<String>,
}

impl AdminPage {
    /// Whether `prefix` is the active section, for the navigation.
    #[must_use]
    pub fn is_section(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.current_path == "/"
        } else {
            self.current_path.starts_with(prefix)
        }
    }
}

impl<S> FromRequestParts<S> for AdminPage
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAdminAuth(admin) = RequireAdminAuth::from_request_parts(parts, state).await?;
        let flash = match parts.extensions.get::<Session>() {
            Some(session) => take_flash(session).await,
            None => None,
        };

        Ok(Self {
            admin_user: AdminUserView::from(&admin),
            admin,
            current_path: parts
                .extensions
                .get::<OriginalUri>()
                .map_or_else(|| parts.uri.path(), |original| original.0.path())
                .to_owned(),
            flash,
        })
    }
}

/// Leave a notice for the next page the admin sees.
pub async fn set_flash(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(session_keys::FLASH, message.into()).await {
        tracing::warn!(error = %e, "Could not store flash message");
    }
}

async fn take_flash(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}

// =============================================================================
// Form helpers
// =============================================================================

/// Checkbox value: browsers only send checked boxes.
#[must_use]
pub fn checked(value: Option<&str>) -> bool {
    matches!(value, Some("on" | "true" | "1"))
}

/// Trimmed text, `None` when blank.
#[must_use]
pub fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Parse an integer form field; blank means `default`.
///
/// # Errors
///
/// Returns a message naming the field when the value is not a number.
pub fn parse_int(field: &str, value: &str, default: i32) -> Result<i32, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed
        .parse()
        .map_err(|_| format!("{field} must be a whole number"))
}

/// The page number of a `?page=` query, starting at 1.
#[must_use]
pub fn page_number(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

/// Query string for pagination links, keeping the other filters.
#[must_use]
pub fn page_link(base: &str, filters: &[(&str, &str)], page: u32) -> String {
    let mut pairs: Vec<String> = filters
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect();
    pairs.push(format!("page={page}"));
    format!("{base}?{}", pairs.join("&"))
}

/// Pagination links for list pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub total: i64,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl Pagination {
    #[must_use]
    pub fn new<T>(page: &Page<T>, base: &str, filters: &[(&str, &str)]) -> Self {
        Self {
            page: page.page,
            pages: page.pages,
            total: page.total,
            previous: page
                .has_previous()
                .then(|| page_link(base, filters, page.page - 1)),
            next: page
                .has_next()
                .then(|| page_link(base, filters, page.page + 1)),
        }
    }
}

// =============================================================================
// Routers
// =============================================================================

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/new", get(products::new_form).post(products::create))
        .route(
            "/products/{id}/edit",
            get(products::edit_form).post(products::update),
        )
        .route("/products/{id}/toggle", post(products::toggle))
        .route("/products/{id}/delete", post(products::delete))
        .route("/categories", get(categories::index).post(categories::create))
        .route("/categories/{id}/delete", post(categories::delete))
}

fn membership_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(membership::index))
        .route("/modules", post(membership::create_module))
        .route(
            "/modules/{id}",
            get(membership::show_module).post(membership::update_module),
        )
        .route("/modules/{id}/delete", post(membership::delete_module))
        .route(
            "/modules/{id}/lessons/new",
            get(membership::new_lesson).post(membership::create_lesson),
        )
        .route(
            "/modules/{id}/lessons/{lesson}/edit",
            get(membership::edit_lesson).post(membership::update_lesson),
        )
        .route(
            "/modules/{id}/lessons/{lesson}/delete",
            post(membership::delete_lesson),
        )
}

fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/blog", get(blog::index))
        .route("/blog/new", get(blog::new_form).post(blog::create))
        .route("/blog/{id}/edit", get(blog::edit_form).post(blog::update))
        .route("/blog/{id}/publish", post(blog::publish))
        .route("/blog/{id}/unpublish", post(blog::unpublish))
        .route("/blog/{id}/delete", post(blog::delete))
        .route(
            "/testimonials",
            get(testimonials::index).post(testimonials::create),
        )
        .route("/testimonials/{id}/delete", post(testimonials::delete))
}

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/auth/login", get(auth::login_page).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .merge(catalog_routes())
        .route("/customers", get(customers::index))
        .route("/customers/{id}", get(customers::show))
        .route(
            "/customers/{id}/membership/grant",
            post(customers::grant_membership),
        )
        .route(
            "/customers/{id}/membership/revoke",
            post(customers::revoke_membership),
        )
        .nest("/membership", membership_routes())
        .merge(content_routes())
        .route("/analytics", get(analytics::analytics_page))
        .route("/api/analytics", get(analytics::analytics_json))
        .route("/settings", get(settings::show).post(settings::update))
        .route(
            "/admin-users",
            get(admin_users::index).post(admin_users::create),
        )
        .route("/admin-users/{id}/delete", post(admin_users::delete))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checked() {
        assert!(checked(Some("on")));
        assert!(checked(Some("true")));
        assert!(!checked(None));
        assert!(!checked(Some("off")));
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("  "), None);
        assert_eq!(optional_text(" ABC-1 "), Some("ABC-1".to_owned()));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("Stock", "", 0), Ok(0));
        assert_eq!(parse_int("Stock", " 12 ", 0), Ok(12));
        assert_eq!(
            parse_int("Stock", "twelve", 0),
            Err("Stock must be a whole number".to_owned())
        );
    }

    #[test]
    fn test_page_link_keeps_filters() {
        assert_eq!(
            page_link("/orders", &[("status", "paid"), ("q", "ana souza")], 3),
            "/orders?status=paid&q=ana%20souza&page=3"
        );
        assert_eq!(page_link("/orders", &[("status", "")], 2), "/orders?page=2");
        assert_eq!(page_number(Some(0)), 1);
    }

    #[test]
    fn test_pagination_links() {
        let page = Page::new(vec![(); 25], 60, 2);
        let pagination = Pagination::new(&page, "/customers", &[("q", "ana")]);
        assert_eq!(pagination.pages, 3);
        assert_eq!(pagination.previous.as_deref(), Some("/customers?q=ana&page=1"));
        assert_eq!(pagination.next.as_deref(), Some("/customers?q=ana&page=3"));
    }

    #[test]
    fn test_is_section() {
        let page = |path: &str| AdminPage {
            admin: CurrentAdmin {
                id: solenne_core::AdminUserId::new(1),
                email: solenne_core::Email::parse("ops@solenne.shop").unwrap(),
                name: "Ops".into(),
                role: AdminRole::Admin,
            },
            admin_user: AdminUserView {
                name: "Ops".into(),
                email: "ops@solenne.shop".into(),
                is_super_admin: false,
                can_write: true,
            },
            current_path: path.to_owned(),
            flash: None,
        };
        assert!(page("/").is_section("/"));
        assert!(!page("/orders").is_section("/"));
        assert!(page("/orders/4").is_section("/orders"));
    }
}
