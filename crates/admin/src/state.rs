//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cms::{CmsClient, CmsError};
use crate::config::AdminConfig;
use crate::services::email::EmailService;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("CMS client: {0}")]
    Cms(#[from] CmsError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    cms: CmsClient,
    email: EmailService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS client or the SMTP transport cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, StateError> {
        let cms = CmsClient::new(&config.cms)?;
        let email = EmailService::new(config.email.as_ref(), &config.storefront_url)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cms,
                email,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cms(&self) -> &CmsClient {
        &self.inner.cms
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }
}
