//! Store settings.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::settings::StoreSettings;
use solenne_core::{CurrencyCode, Email, Money};

use super::{AdminPage, checked, optional_text, parse_int, set_flash};
use crate::db::SettingsRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireWriter;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsForm {
    pub store_name: String,
    #[serde(default)]
    pub contact_email: String,
    pub currency: String,
    pub flat_shipping_fee: String,
    #[serde(default)]
    pub free_shipping_threshold: String,
    pub maintenance_mode: Option<String>,
    #[serde(default)]
    pub maintenance_message: String,
    #[serde(default)]
    pub low_stock_threshold: String,
}

impl From<&StoreSettings> for SettingsForm {
    fn from(s: &StoreSettings) -> Self {
        Self {
            store_name: s.store_name.clone(),
            contact_email: s.contact_email.clone().unwrap_or_default(),
            currency: s.currency.code().to_owned(),
            flat_shipping_fee: s.flat_shipping_fee.to_string(),
            free_shipping_threshold: s
                .free_shipping_threshold
                .map(|t| t.to_string())
                .unwrap_or_default(),
            maintenance_mode: s.maintenance_mode.then(|| "on".to_owned()),
            maintenance_message: s.maintenance_message.clone(),
            low_stock_threshold: s.low_stock_threshold.to_string(),
        }
    }
}

impl SettingsForm {
    #[must_use]
    pub fn is_maintenance(&self) -> bool {
        checked(self.maintenance_mode.as_deref())
    }

    /// Parse and validate the whole form.
    ///
    /// # Errors
    ///
    /// Returns a message for the first invalid field.
    pub fn validate(&self) -> std::result::Result<StoreSettings, String> {
        let currency: CurrencyCode = self
            .currency
            .parse()
            .map_err(|_| format!("Unsupported currency {}", self.currency))?;

        let contact_email = match optional_text(&self.contact_email) {
            Some(email) => Some(
                Email::parse(&email)
                    .map_err(|e| format!("Contact email: {e}"))?
                    .as_str()
                    .to_owned(),
            ),
            None => None,
        };

        let amount = |field: &str, value: &str| -> std::result::Result<Decimal, String> {
            Money::parse(value, currency)
                .map(|m| m.amount)
                .map_err(|e| format!("{field}: {e}"))
        };

        let settings = StoreSettings {
            store_name: self.store_name.trim().to_owned(),
            contact_email,
            currency,
            flat_shipping_fee: amount("Shipping fee", &self.flat_shipping_fee)?,
            free_shipping_threshold: match optional_text(&self.free_shipping_threshold) {
                Some(value) => Some(amount("Free shipping threshold", &value)?),
                None => None,
            },
            maintenance_mode: self.is_maintenance(),
            maintenance_message: self.maintenance_message.trim().to_owned(),
            low_stock_threshold: parse_int("Low stock threshold", &self.low_stock_threshold, 0)?,
        };
        settings.validate().map_err(|e| {
            let message = e.to_string();
            let mut chars = message.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })?;
        Ok(settings)
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "settings/index.html")]
pub struct SettingsTemplate {
    pub page: AdminPage,
    pub form: SettingsForm,
    pub currencies: [CurrencyCode; 5],
    pub max_message_length: usize,
    pub error: Option<String>,
}

impl SettingsTemplate {
    fn new(page: AdminPage, form: SettingsForm, error: Option<String>) -> Self {
        Self {
            page,
            form,
            currencies: CurrencyCode::ALL,
            max_message_length: StoreSettings::MAX_MESSAGE_LENGTH,
            error,
        }
    }
}

/// Settings form.
pub async fn show(page: AdminPage, State(state): State<AppState>) -> Result<SettingsTemplate> {
    let settings = SettingsRepository::new(state.pool()).store().await?;
    Ok(SettingsTemplate::new(page, SettingsForm::from(&settings), None))
}

/// Save settings.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    let settings = match form.validate() {
        Ok(settings) => settings,
        Err(message) => {
            let template = SettingsTemplate::new(page, form, Some(message));
            return Ok((StatusCode::BAD_REQUEST, template).into_response());
        }
    };

    SettingsRepository::new(state.pool())
        .save_store(&settings)
        .await?;
    tracing::info!(
        maintenance_mode = settings.maintenance_mode,
        "Store settings saved"
    );
    set_flash(&session, "Settings saved.").await;
    Ok(Redirect::to("/settings").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> SettingsForm {
        SettingsForm::from(&StoreSettings::default())
    }

    #[test]
    fn test_defaults_round_trip_through_form() {
        assert_eq!(form().validate().unwrap(), StoreSettings::default());
    }

    #[test]
    fn test_blank_threshold_disables_free_shipping() {
        let mut f = form();
        f.free_shipping_threshold = " ".into();
        assert_eq!(f.validate().unwrap().free_shipping_threshold, None);
    }

    #[test]
    fn test_invalid_fields() {
        let mut f = form();
        f.store_name = String::new();
        assert_eq!(f.validate().unwrap_err(), "Store name cannot be empty");

        let mut f = form();
        f.currency = "XYZ".into();
        assert!(f.validate().is_err());

        let mut f = form();
        f.contact_email = "not-an-email".into();
        assert!(f.validate().unwrap_err().starts_with("Contact email"));

        let mut f = form();
        f.low_stock_threshold = "-1".into();
        assert_eq!(
            f.validate().unwrap_err(),
            "Low stock threshold cannot be negative"
        );

        let mut f = form();
        f.maintenance_message = "x".repeat(StoreSettings::MAX_MESSAGE_LENGTH + 1);
        assert!(f.validate().is_err());
    }
}
