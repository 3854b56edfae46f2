//! Maintenance mode.
//!
//! While `maintenance_mode` is on in the store settings, every page answers
//! 503 with the maintenance message. Health checks, static assets and the
//! payment webhook keep working so deploy probes pass and paid orders are
//! still recorded.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::filters;
use crate::state::AppState;

/// Paths served even in maintenance mode.
const ALWAYS_OPEN: [&str; 3] = ["/health", "/static/", "/api/webhooks/"];

#[derive(Template, WebTemplate)]
#[template(path = "maintenance.html")]
struct MaintenanceTemplate {
    store_name: String,
    message: String,
}

/// Answer 503 for storefront pages while the store is in maintenance.
pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_always_open(request.uri().path()) {
        return next.run(request).await;
    }

    match state.settings().get(state.pool()).await {
        Ok(settings) if settings.maintenance_mode => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("retry-after", "600")],
            MaintenanceTemplate {
                store_name: settings.store_name,
                message: settings.maintenance_message,
            },
        )
            .into_response(),
        Ok(_) => next.run(request).await,
        Err(e) => {
            tracing::warn!(error = %e, "Could not load store settings; serving normally");
            next.run(request).await
        }
    }
}

fn is_always_open(path: &str) -> bool {
    ALWAYS_OPEN.iter().any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_open_paths() {
        assert!(is_always_open("/health"));
        assert!(is_always_open("/health/ready"));
        assert!(is_always_open("/static/css/main.css"));
        assert!(is_always_open("/api/webhooks/payments"));
        assert!(!is_always_open("/"));
        assert!(!is_always_open("/products"));
        assert!(!is_always_open("/checkout"));
    }

    #[test]
    fn test_maintenance_page_renders_message() {
        let html = MaintenanceTemplate {
            store_name: "Solenne".into(),
            message: "Back at noon".into(),
        }
        .render()
        .unwrap_or_default();
        assert!(html.contains("Back at noon"));
    }
}
