//! Authentication route handlers.
//!
//! Customers log in with email and password. Registering with the email of
//! a past guest checkout claims that customer record and its orders.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::PageContext;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::is_local_path;
use crate::middleware::{clear_current_customer, set_current_customer};
use crate::models::{CurrentCustomer, Customer};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Where to go after login when no `next` was given.
const DEFAULT_RETURN: &str = "/account";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub next: String,
}

/// Query parameters of the login and register pages.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub email: String,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub email: String,
    pub name: String,
    pub next: String,
}

/// Redirect target after login, restricted to local paths.
fn return_target(next: &str) -> &str {
    if is_local_path(next) && !next.starts_with("/auth/") {
        next
    } else {
        DEFAULT_RETURN
    }
}

fn current_customer(customer: Customer) -> CurrentCustomer {
    CurrentCustomer {
        id: customer.id,
        email: customer.email,
        name: customer.name,
    }
}

/// Store the customer in a fresh session id and redirect.
async fn start_session(session: &Session, customer: Customer, next: &str) -> Result<Response> {
    // New id on privilege change; the cart stays in the session data.
    session.cycle_id().await?;

    let customer = current_customer(customer);
    set_current_customer(session, &customer).await?;
    set_sentry_user(&customer.id, Some(customer.email.as_str()));

    Ok(Redirect::to(return_target(next)).into_response())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: PageContext, Query(query): Query<NextQuery>) -> Response {
    let next = query.next.unwrap_or_default();
    if ctx.is_logged_in() {
        return Redirect::to(return_target(&next)).into_response();
    }

    LoginTemplate {
        ctx,
        error: None,
        email: String::new(),
        next,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(customer) => {
            tracing::info!(customer_id = %customer.id, "Customer logged in");
            start_session(&session, customer, &form.next).await
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login failed: invalid credentials");
            Ok((
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    ctx,
                    error: Some("Email or password is incorrect.".to_owned()),
                    email: form.email,
                    next: form.next,
                },
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: PageContext, Query(query): Query<NextQuery>) -> Response {
    let next = query.next.unwrap_or_default();
    if ctx.is_logged_in() {
        return Redirect::to(return_target(&next)).into_response();
    }

    RegisterTemplate {
        ctx,
        error: None,
        email: String::new(),
        name: String::new(),
        next,
    }
    .into_response()
}

/// Handle registration form submission.
///
/// Sends a welcome email and logs the new customer in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    if form.password != form.password_confirm {
        return Ok(register_rejected(
            ctx,
            form,
            StatusCode::BAD_REQUEST,
            "Passwords do not match.".to_owned(),
        ));
    }

    let customer = match AuthService::new(state.pool())
        .register(&form.email, &form.name, &form.password)
        .await
    {
        Ok(customer) => customer,
        Err(AuthError::AccountExists) => {
            return Ok(register_rejected(
                ctx,
                form,
                StatusCode::CONFLICT,
                "An account with this email already exists. Try logging in instead.".to_owned(),
            ));
        }
        Err(e @ (AuthError::InvalidEmail(_) | AuthError::InvalidName(_) | AuthError::WeakPassword(_))) => {
            let message = match e {
                AuthError::WeakPassword(msg) => msg,
                AuthError::InvalidName(msg) => msg.to_owned(),
                _ => "Please enter a valid email address.".to_owned(),
            };
            return Ok(register_rejected(ctx, form, StatusCode::BAD_REQUEST, message));
        }
        Err(e) => return Err(AppError::from(e)),
    };

    tracing::info!(customer_id = %customer.id, "Customer registered");
    if let Err(e) = state
        .email()
        .send_welcome_email(customer.email.as_str(), &customer.name)
        .await
    {
        tracing::error!(customer_id = %customer.id, error = %e, "Failed to send welcome email");
    }

    start_session(&session, customer, &form.next).await
}

/// Registration form again with an error, keeping what was typed.
fn register_rejected(
    ctx: PageContext,
    form: RegisterForm,
    status: StatusCode,
    message: String,
) -> Response {
    (
        status,
        RegisterTemplate {
            ctx,
            error: Some(message),
            email: form.email,
            name: form.name,
            next: form.next,
        },
    )
        .into_response()
}

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_customer(&session).await?;
    session.cycle_id().await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_target() {
        assert_eq!(return_target("/membership/basics/intro"), "/membership/basics/intro");
        assert_eq!(return_target(""), DEFAULT_RETURN);
        assert_eq!(return_target("https://evil.test"), DEFAULT_RETURN);
        assert_eq!(return_target("//evil.test"), DEFAULT_RETURN);
        assert_eq!(return_target("/auth/login"), DEFAULT_RETURN);
    }
}
