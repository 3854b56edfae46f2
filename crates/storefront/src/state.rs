//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cms::{CmsClient, CmsError};
use crate::config::StorefrontConfig;
use crate::payments::{PaymentError, PaymentGateway};
use crate::services::email::EmailService;
use crate::services::settings::SettingsCache;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Payment(#[from] PaymentError),
    #[error("CMS client: {0}")]
    Cms(#[from] CmsError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: PaymentGateway,
    cms: CmsClient,
    email: EmailService,
    settings: SettingsCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the external service clients cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = PaymentGateway::new(&config.payments)?;
        let cms = CmsClient::new(&config.cms)?;
        let email = EmailService::new(config.email.as_ref(), &config.base_url)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                cms,
                email,
                settings: SettingsCache::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentGateway {
        &self.inner.payments
    }

    #[must_use]
    pub fn cms(&self) -> &CmsClient {
        &self.inner.cms
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsCache {
        &self.inner.settings
    }
}
