//! Payment gateway client.
//!
//! Creates checkout preferences (the hosted payment page the buyer is sent
//! to) and reads payments back when the gateway notifies us. Only the
//! fields this store reads or writes are modelled.

pub mod signature;

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use solenne_core::{CurrencyCode, PaymentStatus};

use crate::config::PaymentConfig;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One item on the hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: CurrencyCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferencePayer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Shipments {
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    pub mode: &'static str,
}

/// Body of a preference creation request.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer: PreferencePayer,
    /// Our order number; comes back on every payment.
    pub external_reference: String,
    pub back_urls: BackUrls,
    pub auto_return: &'static str,
    pub notification_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipments: Option<Shipments>,
    pub statement_descriptor: String,
}

/// A created preference.
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub transaction_amount: Decimal,
    pub currency_id: String,
    #[serde(default)]
    pub date_approved: Option<DateTime<Utc>>,
}

impl GatewayPayment {
    /// Parsed payment status.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` for a status this store does not know.
    pub fn payment_status(&self) -> Result<PaymentStatus, PaymentError> {
        self.status
            .parse()
            .map_err(|e: solenne_core::InvalidStatus| PaymentError::Parse(e.to_string()))
    }

    /// Parsed currency.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` for an unsupported currency.
    pub fn currency(&self) -> Result<CurrencyCode, PaymentError> {
        self.currency_id
            .parse()
            .map_err(|_| PaymentError::Parse(format!("unsupported currency {}", self.currency_id)))
    }
}

/// Payment gateway REST client.
#[derive(Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    api_base: String,
    sandbox: bool,
}

impl PaymentGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.access_token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("Invalid access token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            sandbox: config.sandbox,
        })
    }

    /// URL the buyer should be redirected to for a preference.
    #[must_use]
    pub fn checkout_url<'p>(&self, preference: &'p Preference) -> &'p str {
        if self.sandbox {
            preference
                .sandbox_init_point
                .as_deref()
                .unwrap_or(&preference.init_point)
        } else {
            &preference.init_point
        }
    }

    /// Create a checkout preference.
    ///
    /// The order number doubles as idempotency key so a retried request
    /// does not create a second preference.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    #[instrument(skip(self, request), fields(order_number = %request.external_reference))]
    pub async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, PaymentError> {
        let url = format!("{}/checkout/preferences", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("X-Idempotency-Key", &request.external_reference)
            .json(request)
            .send()
            .await?;

        let preference: Preference = Self::parse(response).await?;
        tracing::info!(preference_id = %preference.id, "Payment preference created");
        Ok(preference)
    }

    /// Fetch a payment by gateway id.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the payment does not exist.
    #[instrument(skip(self))]
    pub async fn get_payment(&self, id: &str) -> Result<GatewayPayment, PaymentError> {
        let url = format!("{}/v1/payments/{}", self.api_base, urlencoding::encode(id));
        let response = self.client.get(&url).send().await?;
        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn gateway(sandbox: bool) -> PaymentGateway {
        PaymentGateway::new(&PaymentConfig {
            access_token: SecretString::from("APP_USR-test-token"),
            webhook_secret: SecretString::from("whsec"),
            api_base: "https://api.example.test/".to_owned(),
            sandbox,
        })
        .unwrap()
    }

    fn preference() -> Preference {
        Preference {
            id: "pref-1".into(),
            init_point: "https://pay.example.test/live".into(),
            sandbox_init_point: Some("https://pay.example.test/sandbox".into()),
        }
    }

    #[test]
    fn test_checkout_url_follows_mode() {
        let pref = preference();
        assert_eq!(gateway(false).checkout_url(&pref), "https://pay.example.test/live");
        assert_eq!(gateway(true).checkout_url(&pref), "https://pay.example.test/sandbox");
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        assert_eq!(gateway(false).api_base, "https://api.example.test");
    }

    #[test]
    fn test_preference_request_serializes_numbers() {
        let request = PreferenceRequest {
            items: vec![PreferenceItem {
                id: "7".into(),
                title: "Serum".into(),
                quantity: 2,
                unit_price: Decimal::new(4990, 2),
                currency_id: CurrencyCode::BRL,
            }],
            payer: PreferencePayer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
            },
            external_reference: "SOL-20260301-ABCDEF".into(),
            back_urls: BackUrls {
                success: "s".into(),
                failure: "f".into(),
                pending: "p".into(),
            },
            auto_return: "approved",
            notification_url: "n".into(),
            shipments: None,
            statement_descriptor: "SOLENNE".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["items"][0]["unit_price"], serde_json::json!(49.9));
        assert_eq!(json["items"][0]["currency_id"], "BRL");
        assert!(json.get("shipments").is_none());
    }

    #[test]
    fn test_gateway_payment_parses() {
        let payment: GatewayPayment = serde_json::from_str(
            r#"{
                "id": 123456,
                "status": "approved",
                "status_detail": "accredited",
                "external_reference": "SOL-20260301-ABCDEF",
                "transaction_amount": 119.7,
                "currency_id": "BRL",
                "date_approved": "2026-03-01T10:00:00.000-03:00",
                "payer": {"email": "ana@example.com"}
            }"#,
        )
        .unwrap();
        assert_eq!(payment.payment_status().unwrap(), PaymentStatus::Approved);
        assert_eq!(payment.currency().unwrap(), CurrencyCode::BRL);
        assert_eq!(payment.transaction_amount, Decimal::new(1197, 1));
        assert!(payment.date_approved.is_some());
    }
}
