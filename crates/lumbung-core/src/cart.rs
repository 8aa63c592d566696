//! # Cart Module
//!
//! The shopping cart is per-session state owned by the caller: a plain
//! SKU → quantity mapping, passed by reference into checkout. It is a value
//! type with no database knowledge; the storage layer resolves SKUs and
//! prices at checkout time.
//!
//! Iteration order is deterministic (sorted by SKU), so a checkout
//! validates lines in a stable order and the first failing line is the same
//! one every time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// A session-held shopping cart: SKU → quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: BTreeMap<String, i64>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds `qty` units of `sku`, accumulating onto any existing line.
    ///
    /// Non-positive quantities are rejected up front; carts are always
    /// well-formed.
    pub fn add(&mut self, sku: impl Into<String>, qty: i64) -> Result<(), ValidationError> {
        if qty <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }

        let line = self.lines.entry(sku.into()).or_insert(0);
        let total = *line + qty;
        if total > MAX_LINE_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_LINE_QUANTITY,
            });
        }
        *line = total;
        Ok(())
    }

    /// Removes a line entirely.
    pub fn remove(&mut self, sku: &str) {
        self.lines.remove(sku);
    }

    /// Empties the cart. Called by the session layer after a successful
    /// checkout.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct SKUs.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines (badge count in the store UI).
    pub fn total_units(&self) -> i64 {
        self.lines.values().sum()
    }

    /// Lines in stable (SKU-sorted) order.
    pub fn lines(&self) -> impl Iterator<Item = (&str, i64)> {
        self.lines.iter().map(|(sku, qty)| (sku.as_str(), *qty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates() {
        let mut cart = Cart::new();
        cart.add("KOPI-250", 2).unwrap();
        cart.add("KOPI-250", 3).unwrap();
        cart.add("TEH-100", 1).unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.total_units(), 6);
        let lines: Vec<_> = cart.lines().collect();
        assert_eq!(lines, vec![("KOPI-250", 5), ("TEH-100", 1)]);
    }

    #[test]
    fn test_add_rejects_non_positive() {
        let mut cart = Cart::new();
        assert!(cart.add("KOPI-250", 0).is_err());
        assert!(cart.add("KOPI-250", -3).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_rejects_runaway_quantity() {
        let mut cart = Cart::new();
        cart.add("KOPI-250", MAX_LINE_QUANTITY).unwrap();
        assert!(cart.add("KOPI-250", 1).is_err());
        assert_eq!(cart.total_units(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_lines_iterate_in_sku_order() {
        let mut cart = Cart::new();
        cart.add("ZZZ", 1).unwrap();
        cart.add("AAA", 1).unwrap();
        cart.add("MMM", 1).unwrap();

        let skus: Vec<_> = cart.lines().map(|(sku, _)| sku.to_string()).collect();
        assert_eq!(skus, vec!["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add("KOPI-250", 2).unwrap();
        cart.add("TEH-100", 1).unwrap();

        cart.remove("KOPI-250");
        assert_eq!(cart.len(), 1);

        cart.clear();
        assert!(cart.is_empty());
    }
}
