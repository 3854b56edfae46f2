//! Store-wide settings edited from the back-office.
//!
//! Persisted as a single JSON document (`shop.settings`, key `store`) and
//! read by the storefront through a short-lived cache.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::ShippingPolicy;
use crate::types::{CurrencyCode, Money};

/// Settings key under which [`StoreSettings`] is stored.
pub const STORE_SETTINGS_KEY: &str = "store";

/// Problems found by [`StoreSettings::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("store name cannot be empty")]
    EmptyStoreName,
    #[error("{0} cannot be negative")]
    Negative(&'static str),
    #[error("maintenance message must be at most {max} characters")]
    MessageTooLong { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub store_name: String,
    pub contact_email: Option<String>,
    pub currency: CurrencyCode,
    pub flat_shipping_fee: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub maintenance_mode: bool,
    pub maintenance_message: String,
    /// Products at or below this stock show "only N left".
    pub low_stock_threshold: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Solenne".to_owned(),
            contact_email: None,
            currency: CurrencyCode::BRL,
            flat_shipping_fee: Decimal::new(1990, 2),
            free_shipping_threshold: Some(Decimal::new(25000, 2)),
            maintenance_mode: false,
            maintenance_message: "We are updating the store. Please come back soon.".to_owned(),
            low_stock_threshold: 5,
        }
    }
}

impl StoreSettings {
    pub const MAX_MESSAGE_LENGTH: usize = 500;

    /// Check the settings before saving.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.store_name.trim().is_empty() {
            return Err(SettingsError::EmptyStoreName);
        }
        if self.flat_shipping_fee.is_sign_negative() {
            return Err(SettingsError::Negative("shipping fee"));
        }
        if self
            .free_shipping_threshold
            .is_some_and(|t| t.is_sign_negative())
        {
            return Err(SettingsError::Negative("free shipping threshold"));
        }
        if self.low_stock_threshold < 0 {
            return Err(SettingsError::Negative("low stock threshold"));
        }
        if self.maintenance_message.chars().count() > Self::MAX_MESSAGE_LENGTH {
            return Err(SettingsError::MessageTooLong {
                max: Self::MAX_MESSAGE_LENGTH,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: Money::new(self.flat_shipping_fee, self.currency),
            free_over: self
                .free_shipping_threshold
                .map(|t| Money::new(t, self.currency)),
        }
    }

    /// Stock label shown on product pages.
    #[must_use]
    pub fn stock_label(&self, stock: i32) -> String {
        if stock <= 0 {
            "Sold out".to_owned()
        } else if stock <= self.low_stock_threshold {
            format!("Only {stock} left")
        } else {
            "In stock".to_owned()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(StoreSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut s = StoreSettings {
            store_name: "  ".into(),
            ..StoreSettings::default()
        };
        assert_eq!(s.validate(), Err(SettingsError::EmptyStoreName));

        s.store_name = "Solenne".into();
        s.flat_shipping_fee = Decimal::new(-1, 0);
        assert_eq!(s.validate(), Err(SettingsError::Negative("shipping fee")));

        s.flat_shipping_fee = Decimal::ZERO;
        s.free_shipping_threshold = Some(Decimal::new(-5, 0));
        assert!(s.validate().is_err());

        s.free_shipping_threshold = None;
        s.maintenance_message = "x".repeat(501);
        assert!(matches!(
            s.validate(),
            Err(SettingsError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let s: StoreSettings =
            serde_json::from_str(r#"{"store_name":"Loja","maintenance_mode":true}"#).unwrap();
        assert_eq!(s.store_name, "Loja");
        assert!(s.maintenance_mode);
        assert_eq!(s.low_stock_threshold, 5);
    }

    #[test]
    fn test_shipping_policy_uses_store_currency() {
        let s = StoreSettings {
            currency: CurrencyCode::USD,
            free_shipping_threshold: None,
            ..StoreSettings::default()
        };
        let policy = s.shipping_policy();
        assert_eq!(policy.flat_fee.currency, CurrencyCode::USD);
        assert_eq!(policy.free_over, None);
    }

    #[test]
    fn test_stock_label() {
        let s = StoreSettings::default();
        assert_eq!(s.stock_label(0), "Sold out");
        assert_eq!(s.stock_label(3), "Only 3 left");
        assert_eq!(s.stock_label(40), "In stock");
    }
}
