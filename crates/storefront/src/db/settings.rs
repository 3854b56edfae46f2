//! Store settings lookup.

use sqlx::PgPool;
use sqlx::types::Json;

use solenne_core::settings::{STORE_SETTINGS_KEY, StoreSettings};

use super::RepositoryError;

/// Read-only access to `shop.settings`.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current store settings, or the defaults when none were saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored document does
    /// not deserialize. Returns `RepositoryError::Database` if the query fails.
    pub async fn store(&self) -> Result<StoreSettings, RepositoryError> {
        let row: Option<Json<serde_json::Value>> =
            sqlx::query_scalar("SELECT value FROM shop.settings WHERE key = $1")
                .bind(STORE_SETTINGS_KEY)
                .fetch_optional(self.pool)
                .await?;

        match row {
            Some(Json(value)) => serde_json::from_value(value)
                .map_err(|e| RepositoryError::DataCorruption(format!("store settings: {e}"))),
            None => Ok(StoreSettings::default()),
        }
    }
}
