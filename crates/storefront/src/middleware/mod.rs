//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CSP nonce (per-request nonce for inline scripts)
//! 5. Security headers (CSP with the nonce, frame and referrer policy)
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Maintenance mode (503 page while the store is closed)
//!
//! Rate limiting (governor) is applied per route group.

pub mod auth;
pub mod csp;
pub mod maintenance;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_customer, set_current_customer};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use maintenance::maintenance_middleware;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
