//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] solenne_core::EmailError),

    /// Invalid credentials (wrong password, unknown email or guest account).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with a password already exists for the email.
    #[error("an account with this email already exists")]
    AccountExists,

    /// Name missing or too long.
    #[error("{0}")]
    InvalidName(&'static str),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
