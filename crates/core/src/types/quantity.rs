//! Item quantity for cart lines and order items.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity is zero or negative.
    #[error("quantity must be at least 1")]
    TooSmall,
    /// Quantity exceeds the per-line maximum.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
    },
}

/// A positive item count, `1..=Quantity::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity of one product on a single line.
    pub const MAX: u32 = 999;

    /// A quantity of one.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is outside `1..=Quantity::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::TooSmall);
        }
        match u32::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(QuantityError::TooLarge { max: Self::MAX }),
        }
    }

    /// The count as `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The count as `i32`, for binding to `INT` columns.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // bounded by MAX
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    /// Add two quantities.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooLarge` if the sum exceeds the maximum.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        Self::new(i64::from(self.0) + i64::from(other.0))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(Quantity::new(0), Err(QuantityError::TooSmall));
        assert_eq!(Quantity::new(-3), Err(QuantityError::TooSmall));
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(Quantity::new(999).unwrap().get(), 999);
        assert_eq!(
            Quantity::new(1000),
            Err(QuantityError::TooLarge { max: 999 })
        );
    }

    #[test]
    fn test_checked_add() {
        let a = Quantity::new(500).unwrap();
        assert_eq!(a.checked_add(Quantity::new(499).unwrap()).unwrap().get(), 999);
        assert!(a.checked_add(a).is_err());
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }
}
