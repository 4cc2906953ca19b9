//! Field-level validation for incoming writes.
//!
//! Handlers deserialize loosely-typed drafts, then call into this module to
//! obtain validated values before touching the database. The schema repeats
//! the numeric checks as `CHECK` constraints.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Money, MoneyError, QuantityError};

/// Maximum product name length (characters).
pub const MAX_PRODUCT_NAME: usize = 200;
/// Maximum product description length (characters).
pub const MAX_DESCRIPTION: usize = 5000;
/// Maximum display name length (characters).
pub const MAX_DISPLAY_NAME: usize = 80;
/// Maximum shipping name length (characters).
pub const MAX_SHIPPING_NAME: usize = 120;
/// Maximum shipping address length (characters).
pub const MAX_SHIPPING_ADDRESS: usize = 500;
/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length (bounds hashing cost).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// A validation failure on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required text is empty after trimming.
    #[error("{field} is required")]
    Required {
        /// Field name.
        field: &'static str,
    },
    /// Text is longer than allowed.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum length.
        max: usize,
    },
    /// Text is shorter than allowed.
    #[error("{field} must be at least {min} characters")]
    TooShort {
        /// Field name.
        field: &'static str,
        /// Minimum length.
        min: usize,
    },
    /// A monetary field is invalid.
    #[error("{field}: {source}")]
    Money {
        /// Field name.
        field: &'static str,
        /// Underlying error.
        source: MoneyError,
    },
    /// A quantity field is invalid.
    #[error("{field}: {source}")]
    Quantity {
        /// Field name.
        field: &'static str,
        /// Underlying error.
        source: QuantityError,
    },
    /// A numeric field is negative.
    #[error("{field} cannot be negative")]
    Negative {
        /// Field name.
        field: &'static str,
    },
    /// A field has an invalid format.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why it is invalid.
        reason: &'static str,
    },
}

impl ValidationError {
    /// Name of the offending field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Required { field }
            | Self::TooLong { field, .. }
            | Self::TooShort { field, .. }
            | Self::Money { field, .. }
            | Self::Quantity { field, .. }
            | Self::Negative { field }
            | Self::Invalid { field, .. } => field,
        }
    }
}

/// Trim and bound a required text field.
///
/// # Errors
///
/// Returns `Required` when empty after trimming, `TooLong` when over `max`.
pub fn required_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// Trim and bound an optional text field; blank becomes `None`.
///
/// # Errors
///
/// Returns `TooLong` when over `max`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) if trimmed.chars().count() > max => {
            Err(ValidationError::TooLong { field, max })
        }
        Some(trimmed) => Ok(Some(trimmed.to_owned())),
    }
}

fn price(field: &'static str, value: &str) -> Result<Money, ValidationError> {
    Money::parse(value).map_err(|source| ValidationError::Money { field, source })
}

fn stock(value: i32) -> Result<i32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { field: "stock" });
    }
    Ok(value)
}

// =============================================================================
// Products
// =============================================================================

/// Product fields as submitted by an admin.
///
/// Prices arrive as strings so that `"19.90"` keeps its exact value.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// A product that passed validation and may be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub is_active: bool,
}

impl ProductDraft {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<ValidProduct, ValidationError> {
        Ok(ValidProduct {
            name: required_text("name", &self.name, MAX_PRODUCT_NAME)?,
            description: optional_text(
                "description",
                self.description.as_deref(),
                MAX_DESCRIPTION,
            )?,
            price: price("price", &self.price)?,
            stock: stock(self.stock)?,
            is_active: self.is_active,
        })
    }
}

/// Partial product update. Absent fields are left unchanged.
///
/// `description: Some("")` clears the description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// A validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidProductPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub price: Option<Money>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

impl ValidProductPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.is_active.is_none()
    }
}

impl ProductPatch {
    /// Validate the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<ValidProductPatch, ValidationError> {
        Ok(ValidProductPatch {
            name: self
                .name
                .as_deref()
                .map(|n| required_text("name", n, MAX_PRODUCT_NAME))
                .transpose()?,
            description: self
                .description
                .as_deref()
                .map(|d| optional_text("description", Some(d), MAX_DESCRIPTION))
                .transpose()?,
            price: self.price.as_deref().map(|p| price("price", p)).transpose()?,
            stock: self.stock.map(stock).transpose()?,
            is_active: self.is_active,
        })
    }
}

// =============================================================================
// Shipping
// =============================================================================

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

impl ShippingDetails {
    /// Validate and normalize shipping fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn parse(
        name: &str,
        address: &str,
        phone: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let name = required_text("shipping_name", name, MAX_SHIPPING_NAME)?;
        let address = required_text("shipping_address", address, MAX_SHIPPING_ADDRESS)?;
        let phone = optional_text("shipping_phone", phone, 32)?;

        if let Some(p) = &phone {
            if p.chars().count() < 5 {
                return Err(ValidationError::TooShort {
                    field: "shipping_phone",
                    min: 5,
                });
            }
            if !p
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
            {
                return Err(ValidationError::Invalid {
                    field: "shipping_phone",
                    reason: "only digits, spaces and + - ( ) are allowed",
                });
            }
        }

        Ok(Self {
            name,
            address,
            phone,
        })
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// Validate a display name.
///
/// # Errors
///
/// Returns `Required` or `TooLong`.
pub fn display_name(value: &str) -> Result<String, ValidationError> {
    required_text("display_name", value, MAX_DISPLAY_NAME)
}

/// Validate a new password.
///
/// # Errors
///
/// Returns `TooShort` or `TooLong`.
pub fn password(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password",
            min: MIN_PASSWORD_LENGTH,
        });
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password",
            max: MAX_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft(name: &str, price: &str, stock: i32) -> ProductDraft {
        ProductDraft {
            name: name.to_owned(),
            description: None,
            price: price.to_owned(),
            stock,
            is_active: true,
        }
    }

    #[test]
    fn test_valid_product() {
        let product = draft("  Mango Jam ", "6.50", 12).validate().unwrap();
        assert_eq!(product.name, "Mango Jam");
        assert_eq!(product.price.to_string(), "6.50");
        assert_eq!(product.stock, 12);
        assert!(product.is_active);
    }

    #[test]
    fn test_negative_price_rejected() {
        let err = draft("Mango Jam", "-1.00", 1).validate().unwrap_err();
        assert_eq!(err.field(), "price");
        assert!(matches!(
            err,
            ValidationError::Money {
                source: MoneyError::Negative,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_stock_rejected() {
        let err = draft("Mango Jam", "1.00", -1).validate().unwrap_err();
        assert_eq!(err, ValidationError::Negative { field: "stock" });
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = draft("   ", "1.00", 0).validate().unwrap_err();
        assert_eq!(err, ValidationError::Required { field: "name" });
    }

    #[test]
    fn test_long_name_rejected() {
        let err = draft(&"x".repeat(201), "1.00", 0).validate().unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 200, .. }));
    }

    #[test]
    fn test_blank_description_becomes_none() {
        let mut d = draft("Jam", "1.00", 0);
        d.description = Some("   ".to_owned());
        assert_eq!(d.validate().unwrap().description, None);
    }

    #[test]
    fn test_draft_defaults_from_json() {
        let d: ProductDraft =
            serde_json::from_str(r#"{"name": "Jam", "price": "2.00"}"#).unwrap();
        let valid = d.validate().unwrap();
        assert_eq!(valid.stock, 0);
        assert!(valid.is_active);
    }

    #[test]
    fn test_patch_only_validates_present_fields() {
        let patch = ProductPatch {
            price: Some("3.25".to_owned()),
            ..ProductPatch::default()
        };
        let valid = patch.validate().unwrap();
        assert_eq!(valid.price.unwrap().to_string(), "3.25");
        assert!(valid.name.is_none());
        assert!(!valid.is_empty());

        assert!(ProductPatch::default().validate().unwrap().is_empty());
    }

    #[test]
    fn test_patch_clears_description() {
        let patch = ProductPatch {
            description: Some(String::new()),
            ..ProductPatch::default()
        };
        assert_eq!(patch.validate().unwrap().description, Some(None));
    }

    #[test]
    fn test_patch_rejects_negative_stock() {
        let patch = ProductPatch {
            stock: Some(-5),
            ..ProductPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_shipping_details() {
        let s = ShippingDetails::parse(" Ana Silva ", "1 Harbour Rd", Some("+44 (0)20 7946")).unwrap();
        assert_eq!(s.name, "Ana Silva");
        assert_eq!(s.phone.as_deref(), Some("+44 (0)20 7946"));

        assert!(ShippingDetails::parse("", "1 Harbour Rd", None).is_err());
        assert!(ShippingDetails::parse("Ana", "", None).is_err());
        assert!(ShippingDetails::parse("Ana", "1 Harbour Rd", Some("call me")).is_err());
        assert!(ShippingDetails::parse("Ana", "1 Harbour Rd", Some("12")).is_err());
        assert_eq!(
            ShippingDetails::parse("Ana", "1 Harbour Rd", Some(" ")).unwrap().phone,
            None
        );
    }

    #[test]
    fn test_password_length() {
        assert!(password("short").is_err());
        assert!(password("long enough").is_ok());
        assert!(password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("  Ana ").unwrap(), "Ana");
        assert!(display_name("").is_err());
    }
}
