//! Store settings with a short-lived cache.
//!
//! Settings are edited in the back-office and read on almost every
//! storefront request (cart totals, maintenance mode, stock labels), so
//! they are cached for a minute.

use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use solenne_core::settings::StoreSettings;

use crate::db::{RepositoryError, SettingsRepository};

const SETTINGS_TTL: Duration = Duration::from_secs(60);

/// Cached view of `shop.settings`.
#[derive(Clone)]
pub struct SettingsCache {
    cache: Cache<(), StoreSettings>,
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(SETTINGS_TTL)
                .build(),
        }
    }

    /// Current settings, loading them when the cached copy expired.
    ///
    /// # Errors
    ///
    /// Returns error if the settings cannot be loaded.
    pub async fn get(&self, pool: &PgPool) -> Result<StoreSettings, RepositoryError> {
        if let Some(settings) = self.cache.get(&()).await {
            return Ok(settings);
        }

        let settings = SettingsRepository::new(pool).store().await?;
        self.cache.insert((), settings.clone()).await;
        Ok(settings)
    }
}
