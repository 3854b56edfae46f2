//! Admin user repository for database operations.

use sqlx::PgPool;

use solenne_core::{AdminRole, AdminUserId, Email};

use super::RepositoryError;
use crate::models::admin_user::AdminUser;

const ADMIN_USER_COLUMNS: &str = "id, email, name, role, last_login_at, created_at";

/// Repository for admin user database operations.
pub struct AdminUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminUserRepository<'a> {
    /// Create a new admin user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all admin users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<AdminUser>, RepositoryError> {
        let sql = format!(
            "SELECT {ADMIN_USER_COLUMNS} FROM admin.admin_users ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, AdminUser>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    /// Get an admin user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError> {
        let sql = format!("SELECT {ADMIN_USER_COLUMNS} FROM admin.admin_users WHERE id = $1");
        Ok(sqlx::query_as::<_, AdminUser>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// An admin user and their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(AdminUser, String)>, RepositoryError> {
        let sql = format!(
            "SELECT {ADMIN_USER_COLUMNS}, password_hash FROM admin.admin_users WHERE email = $1"
        );
        let row = sqlx::query_as::<_, AdminUserWithHash>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    /// Create a new admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        role: AdminRole,
        password_hash: &str,
    ) -> Result<AdminUser, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO admin.admin_users (email, name, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {ADMIN_USER_COLUMNS}
            "
        );
        sqlx::query_as::<_, AdminUser>(&sql)
            .bind(email.as_str())
            .bind(name)
            .bind(role)
            .bind(password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "admin user"))
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch_last_login(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE admin.admin_users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete an admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has the ID.
    pub async fn delete(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM admin.admin_users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of super admins; the last one cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_super_admins(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM admin.admin_users WHERE role = 'super_admin'",
        )
        .fetch_one(self.pool)
        .await?)
    }
}

#[derive(sqlx::FromRow)]
struct AdminUserWithHash {
    #[sqlx(flatten)]
    user: AdminUser,
    password_hash: String,
}
