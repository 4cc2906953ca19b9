//! Monetary amounts using decimal arithmetic.
//!
//! The shop trades in a single currency, so `Money` carries only an amount.
//! Amounts are non-negative with at most two fractional digits, matching the
//! `NUMERIC(12,2)` columns they are stored in.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("amount cannot have more than two decimal places")]
    TooPrecise,
    /// The amount exceeds the storable maximum.
    #[error("amount exceeds the maximum of {max}")]
    TooLarge {
        /// Maximum storable amount.
        max: Decimal,
    },
    /// The input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// Arithmetic on amounts overflowed.
    #[error("amount overflow")]
    Overflow,
}

/// A non-negative monetary amount.
///
/// Serialized as a decimal string (`"19.99"`) to avoid float rounding on the
/// wire.
///
/// ```
/// use marketstall_core::Money;
///
/// let price = Money::parse("19.99").unwrap();
/// assert_eq!(price.to_string(), "19.99");
/// assert!(Money::parse("-1").is_err());
/// assert!(Money::parse("0.001").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest amount that fits in `NUMERIC(12,2)`.
    pub const MAX: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

    /// Parse an amount from a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a decimal or violates the
    /// constraints of [`Money::try_from`].
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let amount: Decimal = s
            .trim()
            .parse()
            .map_err(|_| MoneyError::Invalid(s.to_owned()))?;
        Self::try_from(amount)
    }

    /// Construct from a whole number of cents.
    ///
    /// # Errors
    ///
    /// Returns an error if `cents` is negative or too large.
    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        Self::try_from(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` or `MoneyError::TooLarge` if the sum
    /// cannot be represented.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        Self::try_from(sum)
    }

    /// Multiply by a count (line total = unit price x quantity).
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` or `MoneyError::TooLarge` if the product
    /// cannot be represented.
    pub fn checked_mul(self, count: u32) -> Result<Self, MoneyError> {
        let product = self
            .0
            .checked_mul(Decimal::from(count))
            .ok_or(MoneyError::Overflow)?;
        Self::try_from(product)
    }

    /// Sum a sequence of amounts.
    ///
    /// # Errors
    ///
    /// Returns an error if any intermediate sum cannot be represented.
    pub fn sum<I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let normalized = amount.normalize();
        if normalized.scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        if normalized > Self::MAX {
            return Err(MoneyError::TooLarge { max: Self::MAX });
        }
        let mut value = normalized.abs();
        value.rescale(2);
        Ok(Self(value))
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::try_from(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Money::parse("0").unwrap(), Money::ZERO);
        assert_eq!(Money::parse("12.5").unwrap().to_string(), "12.50");
        assert_eq!(Money::parse(" 3.00 ").unwrap().to_string(), "3.00");
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        assert!(Money::parse("1.2300").is_ok());
    }

    #[test]
    fn test_rejects_negative() {
        assert_eq!(Money::parse("-0.01"), Err(MoneyError::Negative));
    }

    #[test]
    fn test_rejects_sub_cent() {
        assert_eq!(Money::parse("9.999"), Err(MoneyError::TooPrecise));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(Money::parse("ten"), Err(MoneyError::Invalid(_))));
    }

    #[test]
    fn test_rejects_too_large() {
        assert!(Money::parse("9999999999.99").is_ok());
        assert!(matches!(
            Money::parse("10000000000.00"),
            Err(MoneyError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_checked_mul_and_sum() {
        let unit = Money::parse("2.50").unwrap();
        let line = unit.checked_mul(3).unwrap();
        assert_eq!(line.to_string(), "7.50");

        let total = Money::sum([line, Money::parse("0.49").unwrap()]).unwrap();
        assert_eq!(total.to_string(), "7.99");
    }

    #[test]
    fn test_from_cents() {
        assert_eq!(Money::from_cents(1999).unwrap().to_string(), "19.99");
    }

    #[test]
    fn test_serde_uses_strings() {
        let price = Money::parse("4.20").unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"4.20\"");

        let parsed: Money = serde_json::from_str("\"4.2\"").unwrap();
        assert_eq!(parsed, price);
        assert!(serde_json::from_str::<Money>("\"-4.20\"").is_err());
    }
}
