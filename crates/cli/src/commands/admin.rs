//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! solenne-cli admin create -e admin@example.com -n "Admin Name" -r super_admin
//! ```
//!
//! The account gets a generated password that is logged exactly once.

use solenne_admin::services::auth::generate_password;
use solenne_admin::services::{AdminAuthError, AdminAuthService};
use solenne_core::AdminRole;
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Could not reach the database.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, viewer")]
    InvalidRole(String),

    /// Account creation was rejected.
    #[error(transparent)]
    Auth(#[from] AdminAuthError),
}

/// Create a new admin user with a generated password.
///
/// # Errors
///
/// Returns an error for an unknown role, invalid email or name, an email
/// that is already registered, or a database failure.
pub async fn create_user(email: &str, name: &str, role: &str) -> Result<(), AdminError> {
    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;

    let pool = connect().await?;

    tracing::info!("Creating admin user: {} ({})", email, role);

    let password = generate_password();
    let user = AdminAuthService::new(&pool)
        .create_admin(email, name, role, &password)
        .await?;

    tracing::info!(
        id = %user.id,
        email = %user.email,
        role = %user.role,
        "Admin user created"
    );
    tracing::info!("Initial password (shown once): {password}");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_role_is_rejected_before_connecting() {
        let err = create_user("ops@solenne.test", "Ops", "owner")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidRole(ref r) if r == "owner"));
    }
}
