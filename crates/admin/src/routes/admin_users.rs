//! Back-office accounts, managed by super admins.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::{AdminRole, AdminUserId};

use super::{AdminPage, optional_text, set_flash};
use crate::db::AdminUserRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireSuperAdmin;
use crate::models::{AdminUser, CurrentAdmin};
use crate::services::auth::generate_password;
use crate::services::{AdminAuthError, AdminAuthService};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserForm {
    pub email: String,
    pub name: String,
    pub role: String,
    /// Blank generates one.
    #[serde(default)]
    pub password: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin_users/index.html")]
pub struct AdminUsersTemplate {
    pub page: AdminPage,
    pub users: Vec<AdminUser>,
    pub form: AdminUserForm,
    pub error: Option<String>,
}

/// Why an account may not be deleted, if it may not.
///
/// # Errors
///
/// Returns the reason when `target` is the caller or the last super admin.
pub fn check_deletable(
    caller: &CurrentAdmin,
    target: &AdminUser,
    super_admins: i64,
) -> std::result::Result<(), AppError> {
    if caller.id == target.id {
        return Err(AppError::BadRequest(
            "you cannot delete your own account".to_owned(),
        ));
    }
    if target.role == AdminRole::SuperAdmin && super_admins <= 1 {
        return Err(AppError::Conflict(
            "the last super admin cannot be deleted".to_owned(),
        ));
    }
    Ok(())
}

/// Accounts with the create form.
pub async fn index(
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    page: AdminPage,
    State(state): State<AppState>,
) -> Result<AdminUsersTemplate> {
    Ok(AdminUsersTemplate {
        page,
        users: AdminUserRepository::new(state.pool()).list_all().await?,
        form: AdminUserForm {
            role: AdminRole::Admin.as_str().to_owned(),
            ..AdminUserForm::default()
        },
        error: None,
    })
}

/// Create an account. A generated password is shown once in the flash.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AdminUserForm>,
) -> Result<Response> {
    let Ok(role) = form.role.parse::<AdminRole>() else {
        return Err(AppError::BadRequest(format!("unknown role {}", form.role)));
    };
    let (password, generated) = match optional_text(&form.password) {
        Some(password) => (password, false),
        None => (generate_password(), true),
    };

    let result = AdminAuthService::new(state.pool())
        .create_admin(&form.email, &form.name, role, &password)
        .await;

    let (status, message) = match result {
        Ok(user) => {
            tracing::info!(new_admin_id = %user.id, role = %role, "Admin user created");
            let flash = if generated {
                format!(
                    "Created {}. Initial password (shown once): {password}",
                    user.email
                )
            } else {
                format!("Created {}.", user.email)
            };
            set_flash(&session, flash).await;
            return Ok(Redirect::to("/admin-users").into_response());
        }
        Err(AdminAuthError::UserAlreadyExists) => (
            StatusCode::CONFLICT,
            "An admin with this email already exists".to_owned(),
        ),
        Err(
            e @ (AdminAuthError::InvalidEmail(_)
            | AdminAuthError::InvalidName(_)
            | AdminAuthError::WeakPassword(_)),
        ) => (StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => return Err(e.into()),
    };

    let template = AdminUsersTemplate {
        page,
        users: AdminUserRepository::new(state.pool()).list_all().await?,
        form: AdminUserForm {
            password: String::new(),
            ..form
        },
        error: Some(message),
    };
    Ok((status, template).into_response())
}

/// Delete an account other than your own, keeping at least one super admin.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<AdminUserId>,
) -> Result<Redirect> {
    let repo = AdminUserRepository::new(state.pool());
    let target = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("admin user {id}")))?;

    check_deletable(&admin, &target, repo.count_super_admins().await?)?;
    repo.delete(id).await?;

    tracing::info!(deleted_admin_id = %id, "Admin user deleted");
    set_flash(&session, format!("Deleted {}.", target.email)).await;
    Ok(Redirect::to("/admin-users"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solenne_core::Email;

    fn user(id: i32, role: AdminRole) -> AdminUser {
        AdminUser {
            id: AdminUserId::new(id),
            email: Email::parse(&format!("admin{id}@solenne.test")).unwrap(),
            name: format!("Admin {id}"),
            role,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    fn caller(id: i32) -> CurrentAdmin {
        let u = user(id, AdminRole::SuperAdmin);
        CurrentAdmin {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
        }
    }

    #[test]
    fn test_cannot_delete_self() {
        let err = check_deletable(&caller(1), &user(1, AdminRole::SuperAdmin), 2).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_last_super_admin_is_kept() {
        let err = check_deletable(&caller(1), &user(2, AdminRole::SuperAdmin), 1).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(check_deletable(&caller(1), &user(2, AdminRole::SuperAdmin), 2).is_ok());
        assert!(check_deletable(&caller(1), &user(3, AdminRole::Viewer), 1).is_ok());
    }
}
