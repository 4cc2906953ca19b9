//! Order planning.
//!
//! `plan_order` turns the lines a shopper wants to buy and the current state
//! of the referenced products into an [`OrderPlan`]: merged lines priced at
//! the current price, and the order total. It refuses when a product is gone,
//! stock is short, or a price moved since the shopper last saw it.
//!
//! The caller is expected to hold row locks on the products for the duration
//! of the plan and the writes that follow.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::types::{Money, MoneyError, ProductId, Quantity, QuantityError};

/// Upper bound on distinct products in one order.
pub const MAX_ORDER_LINES: usize = 100;

/// What the shopper asked to buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Unit price the shopper was shown, if known.
    pub expected_unit_price: Option<Money>,
}

/// The current state of a product, read under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i32,
    pub is_active: bool,
}

/// A unit price that differs from what the shopper saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceChange {
    pub product_id: ProductId,
    pub name: String,
    pub expected: Money,
    pub current: Money,
}

/// A priced order line ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub line_total: Money,
}

/// The full order to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlan {
    /// One line per product, ordered by product id.
    pub lines: Vec<PlannedLine>,
    pub total: Money,
}

impl OrderPlan {
    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity.get()).sum()
    }
}

/// Why an order could not be planned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Nothing to buy.
    #[error("cart is empty")]
    EmptyCart,
    /// Too many distinct products.
    #[error("an order can contain at most {max} different products")]
    TooManyLines {
        /// Maximum number of lines.
        max: usize,
    },
    /// A product does not exist or is no longer for sale.
    #[error("product {product_id} is no longer available")]
    ProductUnavailable {
        /// The missing product.
        product_id: ProductId,
    },
    /// Not enough stock.
    #[error("not enough stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: i32,
    },
    /// One or more prices changed since the shopper saw them.
    #[error("prices changed for {} product(s)", .0.len())]
    PricesChanged(Vec<PriceChange>),
    /// The order total differs from the one the shopper confirmed.
    #[error("order total changed from {expected} to {actual}")]
    TotalChanged {
        /// Total the shopper confirmed.
        expected: Money,
        /// Total at current prices.
        actual: Money,
    },
    /// Merged quantity out of range.
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    /// Amount arithmetic overflowed.
    #[error(transparent)]
    Amount(#[from] MoneyError),
}

/// Sorted, de-duplicated product IDs referenced by `lines`.
///
/// Lock rows in this order to avoid deadlocks between concurrent checkouts.
#[must_use]
pub fn product_ids(lines: &[RequestedLine]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Plan an order.
///
/// Checks, in order: emptiness, line count, availability and stock of every
/// product, price drift against `expected_unit_price`, then the order total
/// against `expected_total`.
///
/// # Errors
///
/// Returns the first [`CheckoutError`] encountered, except for price drift,
/// where all changed lines are reported together.
pub fn plan_order(
    lines: &[RequestedLine],
    products: &[ProductSnapshot],
    expected_total: Option<Money>,
) -> Result<OrderPlan, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut merged: BTreeMap<ProductId, (Quantity, Option<Money>)> = BTreeMap::new();
    for line in lines {
        match merged.get_mut(&line.product_id) {
            Some((quantity, expected)) => {
                *quantity = quantity.checked_add(line.quantity)?;
                if expected.is_none() {
                    *expected = line.expected_unit_price;
                }
            }
            None => {
                merged.insert(line.product_id, (line.quantity, line.expected_unit_price));
            }
        }
    }

    if merged.len() > MAX_ORDER_LINES {
        return Err(CheckoutError::TooManyLines {
            max: MAX_ORDER_LINES,
        });
    }

    let by_id: HashMap<ProductId, &ProductSnapshot> =
        products.iter().map(|p| (p.id, p)).collect();

    let mut planned = Vec::with_capacity(merged.len());
    let mut changes = Vec::new();

    for (&product_id, &(quantity, expected)) in &merged {
        let product = by_id
            .get(&product_id)
            .filter(|p| p.is_active)
            .ok_or(CheckoutError::ProductUnavailable { product_id })?;

        if quantity.as_i32() > product.stock {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                name: product.name.clone(),
                requested: quantity.get(),
                available: product.stock.max(0),
            });
        }

        if let Some(expected) = expected
            && expected != product.price
        {
            changes.push(PriceChange {
                product_id,
                name: product.name.clone(),
                expected,
                current: product.price,
            });
        }

        planned.push(PlannedLine {
            product_id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            line_total: product.price.checked_mul(quantity.get())?,
        });
    }

    if !changes.is_empty() {
        return Err(CheckoutError::PricesChanged(changes));
    }

    let total = Money::sum(planned.iter().map(|l| l.line_total))?;

    if let Some(expected) = expected_total
        && expected != total
    {
        return Err(CheckoutError::TotalChanged {
            expected,
            actual: total,
        });
    }

    Ok(OrderPlan {
        lines: planned,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn product(id: i32, price: &str, stock: i32) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: money(price),
            stock,
            is_active: true,
        }
    }

    fn line(id: i32, quantity: i64, expected: Option<&str>) -> RequestedLine {
        RequestedLine {
            product_id: ProductId::new(id),
            quantity: Quantity::new(quantity).unwrap(),
            expected_unit_price: expected.map(money),
        }
    }

    #[test]
    fn test_plans_lines_and_total() {
        let plan = plan_order(
            &[line(2, 1, Some("5.00")), line(1, 3, None)],
            &[product(1, "1.50", 10), product(2, "5.00", 1)],
            None,
        )
        .unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].product_id, ProductId::new(1));
        assert_eq!(plan.lines[0].line_total, money("4.50"));
        assert_eq!(plan.total, money("9.50"));
        assert_eq!(plan.item_count(), 4);
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(plan_order(&[], &[], None), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn test_duplicate_lines_are_merged_before_stock_check() {
        let err = plan_order(
            &[line(1, 2, None), line(1, 2, None)],
            &[product(1, "1.00", 3)],
            None,
        )
        .unwrap_err();

        assert_eq!(
            err,
            CheckoutError::InsufficientStock {
                product_id: ProductId::new(1),
                name: "Product 1".to_owned(),
                requested: 4,
                available: 3,
            }
        );
    }

    #[test]
    fn test_missing_product() {
        assert_eq!(
            plan_order(&[line(9, 1, None)], &[product(1, "1.00", 3)], None),
            Err(CheckoutError::ProductUnavailable {
                product_id: ProductId::new(9)
            })
        );
    }

    #[test]
    fn test_inactive_product() {
        let mut archived = product(1, "1.00", 3);
        archived.is_active = false;
        assert!(matches!(
            plan_order(&[line(1, 1, None)], &[archived], None),
            Err(CheckoutError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn test_price_drift_reports_every_changed_line() {
        let err = plan_order(
            &[
                line(1, 1, Some("1.00")),
                line(2, 1, Some("2.00")),
                line(3, 1, Some("3.00")),
            ],
            &[
                product(1, "1.10", 5),
                product(2, "2.00", 5),
                product(3, "2.50", 5),
            ],
            None,
        )
        .unwrap_err();

        let CheckoutError::PricesChanged(changes) = err else {
            panic!("expected price change, got {err:?}");
        };
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].product_id, ProductId::new(1));
        assert_eq!(changes[0].current, money("1.10"));
        assert_eq!(changes[1].expected, money("3.00"));
    }

    #[test]
    fn test_stock_problems_win_over_price_drift() {
        assert!(matches!(
            plan_order(&[line(1, 6, Some("9.99"))], &[product(1, "1.00", 5)], None),
            Err(CheckoutError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_expected_total_mismatch() {
        assert_eq!(
            plan_order(
                &[line(1, 2, None)],
                &[product(1, "1.25", 5)],
                Some(money("2.00")),
            ),
            Err(CheckoutError::TotalChanged {
                expected: money("2.00"),
                actual: money("2.50"),
            })
        );

        assert!(
            plan_order(&[line(1, 2, None)], &[product(1, "1.25", 5)], Some(money("2.50"))).is_ok()
        );
    }

    #[test]
    fn test_too_many_lines() {
        let lines: Vec<_> = (1..=101).map(|id| line(id, 1, None)).collect();
        let products: Vec<_> = (1..=101).map(|id| product(id, "1.00", 1)).collect();
        assert_eq!(
            plan_order(&lines, &products, None),
            Err(CheckoutError::TooManyLines { max: 100 })
        );
    }

    #[test]
    fn test_product_ids_are_sorted_and_unique() {
        let ids = product_ids(&[line(3, 1, None), line(1, 1, None), line(3, 2, None)]);
        assert_eq!(ids, vec![ProductId::new(1), ProductId::new(3)]);
    }
}
