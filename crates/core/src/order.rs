//! Order numbers and checkout contact validation.

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Email, EmailError};

/// Prefix of every human-facing order number.
pub const ORDER_NUMBER_PREFIX: &str = "SOL";

/// Suffix alphabet: no `0/O` or `1/I/L` so numbers can be read over the phone.
const SUFFIX_ALPHABET: &[u8; 31] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 6;

/// A human-facing order number such as `SOL-20261018-7KQ2XM`.
///
/// Sent to the payment gateway as the external reference, so it must be
/// unique (enforced by a unique index) and URL-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

/// Error parsing an order number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order number: {0}")]
pub struct InvalidOrderNumber(String);

impl OrderNumber {
    /// Build an order number from a date and random bytes.
    ///
    /// Each byte selects one suffix character.
    #[must_use]
    pub fn from_parts(date: NaiveDate, random: [u8; SUFFIX_LEN]) -> Self {
        let suffix: String = random
            .iter()
            .map(|b| {
                let idx = usize::from(*b) % SUFFIX_ALPHABET.len();
                char::from(SUFFIX_ALPHABET.get(idx).copied().unwrap_or(b'X'))
            })
            .collect();
        Self(format!(
            "{ORDER_NUMBER_PREFIX}-{}-{suffix}",
            date.format("%Y%m%d")
        ))
    }

    /// Validate an order number received from a URL or the gateway.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrderNumber` when the input is not
    /// `SOL-YYYYMMDD-XXXXXX`.
    pub fn parse(s: &str) -> Result<Self, InvalidOrderNumber> {
        let invalid = || InvalidOrderNumber(s.to_owned());
        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if prefix != ORDER_NUMBER_PREFIX
            || NaiveDate::parse_from_str(date, "%Y%m%d").is_err()
            || suffix.len() != SUFFIX_LEN
            || !suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b))
        {
            return Err(invalid());
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw checkout form input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutContactInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default)]
    pub notes: String,
}

/// Validated shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl ShippingAddress {
    /// Single-line rendering for emails and the admin order page.
    #[must_use]
    pub fn one_line(&self) -> String {
        let complement = self
            .complement
            .as_deref()
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        format!(
            "{}, {}{complement} - {}, {} - {}, {}",
            self.street, self.number, self.district, self.city, self.state, self.postal_code
        )
    }
}

/// Validated checkout contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutContact {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub address: ShippingAddress,
    pub notes: Option<String>,
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl CheckoutContactInput {
    /// Validate every field, collecting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns every failing field so the form can highlight them together.
    pub fn validate(&self) -> Result<CheckoutContact, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut require = |field: &'static str, value: &str, max: usize| -> String {
            let value = value.trim();
            if value.is_empty() {
                errors.push(FieldError {
                    field,
                    message: "is required".to_owned(),
                });
            } else if value.chars().count() > max {
                errors.push(FieldError {
                    field,
                    message: format!("must be at most {max} characters"),
                });
            }
            value.to_owned()
        };

        let name = require("name", &self.name, 120);
        let street = require("street", &self.street, 160);
        let number = require("number", &self.number, 20);
        let district = require("district", &self.district, 80);
        let city = require("city", &self.city, 80);
        let state = require("state", &self.state, 40);

        let email = Email::parse(&self.email).map_err(|e| FieldError {
            field: "email",
            message: match e {
                EmailError::Empty => "is required".to_owned(),
                other => other.to_string(),
            },
        });

        let phone_digits: String = self.phone.chars().filter(char::is_ascii_digit).collect();
        if !(8..=15).contains(&phone_digits.len()) {
            errors.push(FieldError {
                field: "phone",
                message: "must have between 8 and 15 digits".to_owned(),
            });
        }

        let postal_digits: String = self
            .postal_code
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if !(4..=10).contains(&postal_digits.len()) {
            errors.push(FieldError {
                field: "postal_code",
                message: "is invalid".to_owned(),
            });
        }

        let email = match email {
            Ok(email) => Some(email),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let trimmed_optional = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_owned())
        };

        match email {
            Some(email) if errors.is_empty() => Ok(CheckoutContact {
                name,
                email,
                phone: phone_digits,
                address: ShippingAddress {
                    street,
                    number,
                    complement: trimmed_optional(&self.complement),
                    district,
                    city,
                    state: state.to_uppercase(),
                    postal_code: postal_digits.to_uppercase(),
                },
                notes: trimmed_optional(&self.notes),
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn valid_input() -> CheckoutContactInput {
        CheckoutContactInput {
            name: "Ana Souza".into(),
            email: "Ana@Example.com".into(),
            phone: "(11) 98765-4321".into(),
            street: "Rua das Flores".into(),
            number: "120".into(),
            complement: "  ".into(),
            district: "Centro".into(),
            city: "São Paulo".into(),
            state: "sp".into(),
            postal_code: "01001-000".into(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_order_number_format() {
        let number = OrderNumber::from_parts(date(), [0, 1, 2, 30, 31, 255]);
        assert_eq!(number.as_str(), "SOL-20261018-234Z2F");
        assert_eq!(OrderNumber::parse(number.as_str()).unwrap(), number);
    }

    #[test]
    fn test_order_number_parse_rejects_garbage() {
        assert!(OrderNumber::parse("SOL-20261018-ABC").is_err());
        assert!(OrderNumber::parse("XYZ-20261018-ABCDEF").is_err());
        assert!(OrderNumber::parse("SOL-20261340-ABCDEF").is_err());
        assert!(OrderNumber::parse("SOL-20261018-ABCDE0").is_err());
        assert!(OrderNumber::parse("SOL-20261018-ABCDEF-1").is_err());
    }

    #[test]
    fn test_validate_normalizes_contact() {
        let contact = valid_input().validate().unwrap();
        assert_eq!(contact.email.as_str(), "ana@example.com");
        assert_eq!(contact.phone, "11987654321");
        assert_eq!(contact.address.state, "SP");
        assert_eq!(contact.address.postal_code, "01001000");
        assert_eq!(contact.address.complement, None);
        assert_eq!(contact.notes, None);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let input = CheckoutContactInput {
            name: " ".into(),
            email: "bad".into(),
            phone: "12".into(),
            ..valid_input()
        };
        let errors = input.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"phone"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_one_line_address() {
        let mut contact = valid_input();
        contact.complement = "apto 4".into();
        let address = contact.validate().unwrap().address;
        assert_eq!(
            address.one_line(),
            "Rua das Flores, 120 (apto 4) - Centro, São Paulo - SP, 01001000"
        );
    }
}
