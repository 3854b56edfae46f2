//! Monetary amounts using decimal arithmetic.
//!
//! Catalog prices, cart totals and order totals all flow through [`Money`].
//! Amounts are kept as `rust_decimal::Decimal` in the currency's standard
//! unit (reais, dollars), never as floats.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors from money arithmetic and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        left: CurrencyCode,
        right: CurrencyCode,
    },
    /// Unknown ISO 4217 code.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    /// Amount string is not a decimal number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// Amount is negative where only non-negative amounts are allowed.
    #[error("amount cannot be negative")]
    Negative,
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
    EUR,
    ARS,
    MXN,
}

impl CurrencyCode {
    /// All supported currencies, in settings-form order.
    pub const ALL: [Self; 5] = [Self::BRL, Self::USD, Self::EUR, Self::ARS, Self::MXN];

    /// Three-letter code as sent to the payment gateway.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BRL => "BRL",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::ARS => "ARS",
            Self::MXN => "MXN",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::BRL => "R$ ",
            Self::USD | Self::ARS | Self::MXN => "$",
            Self::EUR => "€",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MoneyError::UnsupportedCurrency(s.to_owned()))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CurrencyCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CurrencyCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CurrencyCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}

/// An amount of money in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Create from minor units (centavos, cents).
    #[must_use]
    pub fn from_minor(minor: i64, currency: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, 2), currency)
    }

    /// Parse a user-entered amount such as `49.90` or `49,90`.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidAmount` for non-numeric input and
    /// `MoneyError::Negative` for negative amounts.
    pub fn parse(input: &str, currency: CurrencyCode) -> Result<Self, MoneyError> {
        let normalized = input.trim().replace(',', ".");
        let amount = Decimal::from_str(&normalized)
            .map_err(|_| MoneyError::InvalidAmount(input.to_owned()))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self::new(amount, currency).rounded())
    }

    /// Round to two decimal places, half away from zero.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency,
        )
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Amount in minor units after rounding (what card networks charge).
    #[must_use]
    pub fn minor_units(&self) -> i64 {
        (self.rounded().amount * Decimal::ONE_HUNDRED)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Add two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` if the currencies differ.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency)
    }

    /// Format for display (e.g., `R$ 49.90`, `$12.00`).
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency.symbol(), self.rounded().amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn brl(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::BRL)
    }

    #[test]
    fn test_display() {
        assert_eq!(brl(4990).display(), "R$ 49.90");
        assert_eq!(Money::from_minor(1200, CurrencyCode::USD).display(), "$12.00");
        assert_eq!(Money::from_minor(5, CurrencyCode::EUR).display(), "€0.05");
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(brl(1000).checked_add(brl(250)).unwrap(), brl(1250));
        let err = brl(1000)
            .checked_add(Money::from_minor(100, CurrencyCode::USD))
            .unwrap_err();
        assert!(matches!(err, MoneyError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_times() {
        assert_eq!(brl(1999).times(3), brl(5997));
        assert!(brl(1999).times(0).is_zero());
    }

    #[test]
    fn test_parse_amounts() {
        assert_eq!(Money::parse("49,90", CurrencyCode::BRL).unwrap(), brl(4990));
        assert_eq!(Money::parse(" 10 ", CurrencyCode::BRL).unwrap(), brl(1000));
        assert_eq!(Money::parse("0.005", CurrencyCode::BRL).unwrap(), brl(1));
        assert_eq!(
            Money::parse("-1", CurrencyCode::BRL),
            Err(MoneyError::Negative)
        );
        assert!(matches!(
            Money::parse("abc", CurrencyCode::BRL),
            Err(MoneyError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(brl(4990).minor_units(), 4990);
        let third = Money::new(Decimal::new(3333, 3), CurrencyCode::BRL);
        assert_eq!(third.minor_units(), 333);
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("brl".parse::<CurrencyCode>().unwrap(), CurrencyCode::BRL);
        assert_eq!(" USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("JPY".parse::<CurrencyCode>().is_err());
    }
}
