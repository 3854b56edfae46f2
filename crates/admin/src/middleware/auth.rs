//! Authentication middleware and extractors for admin.
//!
//! Every back-office page needs a logged-in admin. Viewers can read
//! everything but change nothing; admin accounts are managed by super admins.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{AdminRole, CurrentAdmin, session_keys};

/// Level of access a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any logged-in admin, viewers included.
    Read,
    /// Admins and super admins.
    Write,
    /// Super admins only.
    ManageAdmins,
}

/// Error returned when the current admin may not access a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Logged in, but the role is not enough.
    Forbidden(&'static str),
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message).into_response(),
        }
    }
}

/// Decide whether `admin` may access `path` with the required access.
///
/// # Errors
///
/// Returns the rejection to send when access is denied.
pub fn authorize(
    admin: Option<CurrentAdmin>,
    path: &str,
    access: Access,
) -> Result<CurrentAdmin, AdminAuthRejection> {
    let Some(admin) = admin else {
        return Err(if path.starts_with("/api/") {
            AdminAuthRejection::Unauthorized
        } else {
            AdminAuthRejection::RedirectToLogin
        });
    };

    match access {
        Access::Read => Ok(admin),
        Access::Write if admin.role.can_write() => Ok(admin),
        Access::Write => Err(AdminAuthRejection::Forbidden(
            "Viewers cannot make changes",
        )),
        Access::ManageAdmins if admin.role.can_manage_admins() => Ok(admin),
        Access::ManageAdmins => Err(AdminAuthRejection::Forbidden(
            "Only super admins can access this resource",
        )),
    }
}

async fn session_admin(parts: &Parts) -> Option<CurrentAdmin> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
}

async fn extract(parts: &Parts, access: Access) -> Result<CurrentAdmin, AdminAuthRejection> {
    let admin = session_admin(parts).await;
    let result = authorize(admin, parts.uri.path(), access);
    if let Err(AdminAuthRejection::Forbidden(_)) = &result {
        tracing::warn!(path = %parts.uri.path(), ?access, "Admin lacks role for route");
    }
    result
}

/// Extractor that requires admin authentication.
///
/// If the admin is not logged in, returns a redirect to the login page
/// for HTML requests, or 401 Unauthorized for API requests.
pub struct RequireAdminAuth(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract(parts, Access::Read).await.map(Self)
    }
}

/// Extractor for routes that change data; viewers get 403.
pub struct RequireWriter(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireWriter
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract(parts, Access::Write).await.map(Self)
    }
}

/// Extractor that requires super admin authentication.
///
/// If the admin is not logged in, redirects to login.
/// If the admin is not a super admin, returns 403 Forbidden.
pub struct RequireSuperAdmin(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract(parts, Access::ManageAdmins).await.map(Self)
    }
}

/// Extractor that optionally gets the current admin.
///
/// Unlike `RequireAdminAuth`, this does not reject the request if the admin is not logged in.
pub struct OptionalAdminAuth(pub Option<CurrentAdmin>);

impl<S> FromRequestParts<S> for OptionalAdminAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_admin(parts).await))
    }
}

/// Helper to set the current admin in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use solenne_core::{AdminUserId, Email};

    fn admin(role: AdminRole) -> CurrentAdmin {
        CurrentAdmin {
            id: AdminUserId::new(1),
            email: Email::parse("ops@solenne.shop").unwrap(),
            name: "Ops".into(),
            role,
        }
    }

    #[test]
    fn test_anonymous_page_redirects_to_login() {
        assert_eq!(
            authorize(None, "/orders", Access::Read).unwrap_err(),
            AdminAuthRejection::RedirectToLogin
        );
    }

    #[test]
    fn test_anonymous_api_is_unauthorized() {
        assert_eq!(
            authorize(None, "/api/analytics", Access::Read).unwrap_err(),
            AdminAuthRejection::Unauthorized
        );
    }

    #[test]
    fn test_viewer_can_read_but_not_write() {
        assert!(authorize(Some(admin(AdminRole::Viewer)), "/orders", Access::Read).is_ok());
        assert!(matches!(
            authorize(Some(admin(AdminRole::Viewer)), "/orders/1/status", Access::Write),
            Err(AdminAuthRejection::Forbidden(_))
        ));
    }

    #[test]
    fn test_only_super_admin_manages_admins() {
        assert!(matches!(
            authorize(Some(admin(AdminRole::Admin)), "/admin-users", Access::ManageAdmins),
            Err(AdminAuthRejection::Forbidden(_))
        ));
        assert!(
            authorize(
                Some(admin(AdminRole::SuperAdmin)),
                "/admin-users",
                Access::ManageAdmins
            )
            .is_ok()
        );
    }

    #[test]
    fn test_forbidden_response_status() {
        let response = AdminAuthRejection::Forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = AdminAuthRejection::RedirectToLogin.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
