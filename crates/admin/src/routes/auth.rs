//! Authentication route handlers for admin.
//!
//! Email and password login. The session id is rotated on login and the
//! whole session is dropped on logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAdminAuth, set_current_admin};
use crate::models::CurrentAdmin;
use crate::services::auth::{AdminAuthError, AdminAuthService};
use crate::state::AppState;

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
}

/// Display the login page; logged-in admins go to the dashboard.
pub async fn login_page(OptionalAdminAuth(admin): OptionalAdminAuth) -> Response {
    if admin.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        error: None,
        email: String::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match AdminAuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            session.cycle_id().await?;
            let admin = CurrentAdmin::from(user);
            set_current_admin(&session, &admin).await?;
            set_sentry_user(&admin.id, Some(admin.email.as_str()));
            tracing::info!(admin_id = %admin.id, role = %admin.role, "Admin logged in");
            Ok(Redirect::to("/").into_response())
        }
        Err(AdminAuthError::InvalidCredentials) => {
            tracing::warn!("Admin login failed: invalid credentials");
            Ok((
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    error: Some("Email or password is incorrect.".to_owned()),
                    email: form.email,
                },
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Logout and clear session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    session.flush().await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_template_shows_error_and_keeps_email() {
        let html = LoginTemplate {
            error: Some("Email or password is incorrect.".to_owned()),
            email: "ops@solenne.shop".to_owned(),
        }
        .render()
        .unwrap();
        assert!(html.contains("Email or password is incorrect."));
        assert!(html.contains("value=\"ops@solenne.shop\""));
    }
}
