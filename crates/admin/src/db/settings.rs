//! Store settings persistence.
//!
//! One JSONB document in `shop.settings` under the `store` key; the
//! storefront picks up changes when its cache expires.

use sqlx::PgPool;
use sqlx::types::Json;

use solenne_core::settings::{STORE_SETTINGS_KEY, StoreSettings};

use super::RepositoryError;

/// Repository for `shop.settings`.
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

    /// Save the store settings. Callers validate first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn save_store(&self, settings: &StoreSettings) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            ",
        )
        .bind(STORE_SETTINGS_KEY)
        .bind(Json(settings))
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
