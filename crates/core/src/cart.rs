//! Cart quantity rules and totals.

use serde::Serialize;
use thiserror::Error;

use crate::types::{Money, MoneyError, ProductId, Quantity, QuantityError};

/// Why a cart change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product does not exist or is not for sale.
    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),
    /// Not enough stock for the requested quantity.
    #[error("only {available} left in stock")]
    InsufficientStock {
        /// Units currently in stock.
        available: i32,
    },
    /// The resulting quantity is out of range.
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// Quantity after adding `added` units to a line that may already exist.
///
/// Adding a product that is already in the cart increments its quantity
/// instead of creating a second line.
///
/// # Errors
///
/// Returns `InsufficientStock` if the merged quantity exceeds `stock`, or
/// `Quantity` if it exceeds [`Quantity::MAX`].
pub fn merge_quantity(
    existing: Option<Quantity>,
    added: Quantity,
    stock: i32,
) -> Result<Quantity, CartError> {
    let merged = match existing {
        Some(current) => current.checked_add(added)?,
        None => added,
    };
    set_quantity(merged, stock)
}

/// Check an explicitly requested quantity against stock.
///
/// # Errors
///
/// Returns `InsufficientStock` if `requested` exceeds `stock`.
pub fn set_quantity(requested: Quantity, stock: i32) -> Result<Quantity, CartError> {
    if requested.as_i32() > stock {
        return Err(CartError::InsufficientStock {
            available: stock.max(0),
        });
    }
    Ok(requested)
}

/// A priced cart line, as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: Quantity,
    /// Current product price.
    pub unit_price: Money,
    /// Price when the line was added or last confirmed.
    pub unit_price_snapshot: Money,
    pub line_total: Money,
    /// Units in stock right now.
    pub available: i32,
    pub is_active: bool,
}

impl CartLine {
    /// The price moved since the shopper added this line.
    #[must_use]
    pub fn price_changed(&self) -> bool {
        self.unit_price != self.unit_price_snapshot
    }

    /// The line can no longer be checked out as-is.
    #[must_use]
    pub fn has_problem(&self) -> bool {
        !self.is_active || self.quantity.as_i32() > self.available
    }
}

/// Totals over a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub subtotal: Money,
}

impl CartSummary {
    /// Compute totals for the given lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the subtotal overflows.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, MoneyError> {
        let subtotal = Money::sum(lines.iter().map(|l| l.line_total))?;
        let item_count = lines.iter().map(|l| l.quantity.get()).sum();
        Ok(Self {
            lines,
            item_count,
            subtotal,
        })
    }

    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            item_count: 0,
            subtotal: Money::ZERO,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn q(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_adding_twice_increments() {
        let first = merge_quantity(None, q(2), 10).unwrap();
        let second = merge_quantity(Some(first), q(3), 10).unwrap();
        assert_eq!(second.get(), 5);
    }

    #[test]
    fn test_merge_respects_stock() {
        assert_eq!(
            merge_quantity(Some(q(4)), q(2), 5),
            Err(CartError::InsufficientStock { available: 5 })
        );
    }

    #[test]
    fn test_merge_respects_max_quantity() {
        assert!(matches!(
            merge_quantity(Some(q(999)), q(1), 5000),
            Err(CartError::Quantity(QuantityError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_set_quantity_out_of_stock() {
        assert_eq!(
            set_quantity(q(1), 0),
            Err(CartError::InsufficientStock { available: 0 })
        );
        assert_eq!(set_quantity(q(3), 3).unwrap().get(), 3);
    }

    fn line(price: &str, snapshot: &str, quantity: i64, available: i32) -> CartLine {
        let unit_price = Money::parse(price).unwrap();
        let quantity = q(quantity);
        CartLine {
            product_id: ProductId::new(1),
            name: "Jam".to_owned(),
            image_url: None,
            quantity,
            unit_price,
            unit_price_snapshot: Money::parse(snapshot).unwrap(),
            line_total: unit_price.checked_mul(quantity.get()).unwrap(),
            available,
            is_active: true,
        }
    }

    #[test]
    fn test_summary_totals() {
        let summary =
            CartSummary::from_lines(vec![line("2.00", "2.00", 2, 9), line("0.99", "0.99", 1, 9)])
                .unwrap();
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal.to_string(), "4.99");
    }

    #[test]
    fn test_line_flags() {
        assert!(line("2.10", "2.00", 1, 5).price_changed());
        assert!(!line("2.00", "2.00", 1, 5).price_changed());
        assert!(line("2.00", "2.00", 6, 5).has_problem());
    }
}
