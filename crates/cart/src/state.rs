//! Immutable cart snapshots.
//!
//! A [`CartState`] is never changed in place. Every transition builds a new
//! snapshot and leaves the old one untouched, so a snapshot handed to a
//! consumer stays valid no matter what happens to the cart afterwards.

use std::collections::HashSet;
use std::sync::Arc;

use go_market_core::{LineItem, NewLineItem, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A persisted cart listed the same product twice.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate line item for product {0}")]
pub struct DuplicateItemError(pub ProductId);

/// An ordered, read-only snapshot of the cart's line items.
///
/// Ids are unique within a snapshot and every quantity is at least one.
/// Cloning is cheap: the items are shared behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct CartState {
    items: Arc<[LineItem]>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a snapshot from its persisted JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a field is invalid, a
    /// quantity is zero, or a product id appears more than once.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the snapshot to its persisted JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.items)
    }

    /// The line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Iterate over the line items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.items.iter()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by product id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Whether a line with this product id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Sum of all quantities (the cart badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc.saturating_add(item.line_price()))
    }

    /// The snapshot after adding `candidate`.
    ///
    /// A product already in the cart gains one unit in its existing
    /// position; a new product is appended with a quantity of one. Returns
    /// `None` only when the existing line is already at the maximum quantity.
    #[must_use]
    pub fn with_added(&self, candidate: NewLineItem) -> Option<Self> {
        if self.contains(candidate.id.as_str()) {
            return self.with_incremented(candidate.id.as_str());
        }

        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend_from_slice(&self.items);
        items.push(candidate.into_line_item());
        Some(Self::from_unique(items))
    }

    /// The snapshot after adding one unit of `id`.
    ///
    /// Returns `None` if `id` is not in the cart or its quantity cannot grow.
    #[must_use]
    pub fn with_incremented(&self, id: &str) -> Option<Self> {
        let index = self.position(id)?;
        let item = self.items.get(index)?;
        let quantity = item.quantity.incremented()?;
        Some(self.replace(index, Some(item.with_quantity(quantity))))
    }

    /// The snapshot after removing one unit of `id`.
    ///
    /// The last unit removes the line entirely. Returns `None` if `id` is not
    /// in the cart.
    #[must_use]
    pub fn with_decremented(&self, id: &str) -> Option<Self> {
        let index = self.position(id)?;
        let item = self.items.get(index)?;
        let replacement = item
            .quantity
            .decremented()
            .map(|quantity| item.with_quantity(quantity));
        Some(self.replace(index, replacement))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Copy the items, swapping the line at `index` for `replacement` or
    /// dropping it when `replacement` is `None`.
    fn replace(&self, index: usize, replacement: Option<LineItem>) -> Self {
        let mut replacement = replacement;
        let items = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                if i == index {
                    replacement.take()
                } else {
                    Some(item.clone())
                }
            })
            .collect();
        Self::from_unique(items)
    }

    fn from_unique(items: Vec<LineItem>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

impl TryFrom<Vec<LineItem>> for CartState {
    type Error = DuplicateItemError;

    fn try_from(items: Vec<LineItem>) -> Result<Self, Self::Error> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(DuplicateItemError(item.id.clone()));
            }
        }
        Ok(Self::from_unique(items))
    }
}

impl From<CartState> for Vec<LineItem> {
    fn from(state: CartState) -> Self {
        state.items.to_vec()
    }
}

impl<'a> IntoIterator for &'a CartState {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use go_market_core::{Price, Quantity};
    use proptest::prelude::*;

    use super::*;

    fn priced(id: &str, price: Price) -> NewLineItem {
        NewLineItem::new(
            ProductId::parse(id).unwrap(),
            format!("Product {id}"),
            format!("https://img.example/{id}.png"),
            price,
        )
    }

    fn candidate(id: &str) -> NewLineItem {
        priced(id, Price::from_cents(1000).unwrap())
    }

    fn with_quantity(id: &str, quantity: u32) -> CartState {
        let item = candidate(id)
            .into_line_item()
            .with_quantity(Quantity::new(quantity).unwrap());
        CartState::try_from(vec![item]).unwrap()
    }

    fn ids(state: &CartState) -> Vec<&str> {
        state.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn test_add_to_empty() {
        let state = CartState::empty().with_added(candidate("p1")).unwrap();
        assert_eq!(ids(&state), ["p1"]);
        assert_eq!(state.get("p1").unwrap().quantity, Quantity::ONE);
    }

    #[test]
    fn test_add_twice_merges() {
        let state = CartState::empty()
            .with_added(candidate("p1"))
            .unwrap()
            .with_added(candidate("p1"))
            .unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("p1").unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_add_merge_keeps_position() {
        let state = CartState::empty()
            .with_added(candidate("a"))
            .unwrap()
            .with_added(candidate("b"))
            .unwrap()
            .with_added(candidate("a"))
            .unwrap();
        assert_eq!(ids(&state), ["a", "b"]);
    }

    #[test]
    fn test_increment_existing() {
        let state = with_quantity("p1", 1).with_incremented("p1").unwrap();
        assert_eq!(state.get("p1").unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_increment_unknown_is_none() {
        assert!(with_quantity("p1", 1).with_incremented("unknown").is_none());
    }

    #[test]
    fn test_increment_at_max_is_none() {
        assert!(with_quantity("p1", u32::MAX).with_incremented("p1").is_none());
    }

    #[test]
    fn test_decrement_last_unit_removes() {
        let state = with_quantity("p1", 1).with_decremented("p1").unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_decrement_keeps_line() {
        let state = with_quantity("p1", 3).with_decremented("p1").unwrap();
        assert_eq!(state.get("p1").unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_decrement_unknown_is_none() {
        assert!(with_quantity("p1", 1).with_decremented("nope").is_none());
    }

    #[test]
    fn test_transitions_do_not_touch_original() {
        let original = with_quantity("p1", 2);
        let _ = original.with_incremented("p1").unwrap();
        let _ = original.with_decremented("p1").unwrap();
        assert_eq!(original.get("p1").unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_totals() {
        let state = CartState::empty()
            .with_added(candidate("a"))
            .unwrap()
            .with_added(candidate("a"))
            .unwrap()
            .with_added(candidate("b"))
            .unwrap();
        assert_eq!(state.total_quantity(), 3);
        assert_eq!(state.subtotal(), Decimal::new(3000, 2));
    }

    #[test]
    fn test_json_rejects_duplicates() {
        let json = r#"[
            {"id":"p1","title":"A","image_url":"a","price":1,"quantity":1},
            {"id":"p1","title":"B","image_url":"b","price":2,"quantity":1}
        ]"#;
        let err = CartState::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate line item for product p1"));
    }

    #[test]
    fn test_json_rejects_zero_quantity() {
        let json = r#"[{"id":"p1","title":"A","image_url":"a","price":1,"quantity":0}]"#;
        assert!(CartState::from_json(json).is_err());
    }

    #[test]
    fn test_json_empty_array() {
        assert!(CartState::from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_json_keeps_full_precision_prices() {
        let state = CartState::empty()
            .with_added(priced("a", Price::new("12345678901234.5".parse().unwrap()).unwrap()))
            .unwrap()
            .with_added(priced("b", Price::new("0.333333333333333".parse().unwrap()).unwrap()))
            .unwrap();
        let restored = CartState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_json_rounds_overlong_price() {
        let json = r#"[{"id":"p1","title":"A","image_url":"a","price":0.30000000000000004,"quantity":1}]"#;
        let state = CartState::from_json(json).unwrap();
        assert_eq!(state.get("p1").unwrap().price.amount(), Decimal::new(3, 1));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, Price),
        Increment(u8),
        Decrement(u8),
    }

    /// Any price of up to 15 significant digits, at any scale from whole
    /// units to twelve decimal places.
    fn price() -> impl Strategy<Value = Price> {
        (0i64..1_000_000_000_000_000, 0u32..=12)
            .prop_map(|(mantissa, scale)| Price::new(Decimal::new(mantissa, scale)).unwrap())
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..5, price()).prop_map(|(n, price)| Op::Add(n, price)),
            (0u8..5).prop_map(Op::Increment),
            (0u8..5).prop_map(Op::Decrement),
        ]
    }

    fn apply(state: &CartState, op: &Op) -> CartState {
        let next = match op {
            Op::Add(n, price) => state.with_added(priced(&format!("p{n}"), *price)),
            Op::Increment(n) => state.with_incremented(&format!("p{n}")),
            Op::Decrement(n) => state.with_decremented(&format!("p{n}")),
        };
        next.unwrap_or_else(|| state.clone())
    }

    proptest! {
        #[test]
        fn prop_ids_unique_and_quantities_positive(ops in prop::collection::vec(op(), 0..64)) {
            let mut state = CartState::empty();
            for op in &ops {
                state = apply(&state, op);
                let mut seen = HashSet::new();
                for item in &state {
                    prop_assert!(item.quantity.get() >= 1);
                    prop_assert!(seen.insert(item.id.clone()));
                }
            }
        }

        #[test]
        fn prop_json_roundtrip_preserves_order(ops in prop::collection::vec(op(), 0..64)) {
            let state = ops.iter().fold(CartState::empty(), |state, op| apply(&state, op));
            let restored = CartState::from_json(&state.to_json().unwrap()).unwrap();
            prop_assert_eq!(restored, state);
        }
    }
}
