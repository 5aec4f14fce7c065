//! Cart state machine: lines, origin, and merge logic.
//!
//! [`CartState`] is pure data plus mutation rules - no I/O. The
//! [`CartSynchronizer`](crate::CartSynchronizer) owns a `CartState`
//! exclusively and drives it from local edits and server reconciliation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cartbridge_core::{Price, ProductId};

use crate::error::CartError;

/// Maximum quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// A single product line in a cart.
///
/// Wire format: `{"productId": "...", "quantity": 2, "unitPriceSnapshot": "19.99"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Opaque product identifier.
    pub product_id: ProductId,
    /// Units of this product, always >= 1.
    pub quantity: u32,
    /// Unit price captured when the line was added.
    pub unit_price_snapshot: Price,
}

impl CartLine {
    /// Create a new cart line.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: u32, unit_price_snapshot: Price) -> Self {
        Self {
            product_id,
            quantity,
            unit_price_snapshot,
        }
    }
}

/// Serialization envelope for a full cart, shared by the HTTP backend and
/// local persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDocument {
    /// The cart's lines.
    pub lines: Vec<CartLine>,
}

/// Where the current cart state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartOrigin {
    /// Built from local edits only; no server cart has been seen.
    Local,
    /// Fetched from the server as-is.
    Server,
    /// Local and server views have been merged. Stable once reached.
    Merged,
}

/// The cart's authoritative state.
///
/// Invariants:
/// - A product id appears at most once.
/// - Every line quantity is in `1..=MAX_LINE_QUANTITY`.
/// - `dirty` is true iff local mutations exist that have not been persisted
///   to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    lines: BTreeMap<ProductId, CartLine>,
    origin: CartOrigin,
    dirty: bool,
}

impl Default for CartState {
    fn default() -> Self {
        Self::new()
    }
}

impl CartState {
    /// Create an empty local cart. The initial state for any new session,
    /// guests included.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: BTreeMap::new(),
            origin: CartOrigin::Local,
            dirty: false,
        }
    }

    /// Rebuild a local cart from previously saved lines (e.g., a persisted
    /// guest cart). The restored state is clean: nothing has diverged from
    /// what was saved.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(|line| (line.product_id.clone(), line))
                .collect(),
            origin: CartOrigin::Local,
            dirty: false,
        }
    }

    /// Add units of a product to the cart.
    ///
    /// Quantities for an existing line are summed. Failed validation leaves
    /// the state untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` if `quantity` is 0, or
    /// `QuantityLimitExceeded` if the summed quantity would exceed
    /// [`MAX_LINE_QUANTITY`].
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Price,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let existing = self.lines.get(&product_id).map_or(0, |line| line.quantity);
        // Widen so the error reports the true sum even near u32::MAX
        let total = u64::from(existing) + u64::from(quantity);
        if total > u64::from(MAX_LINE_QUANTITY) {
            return Err(CartError::QuantityLimitExceeded {
                product_id,
                requested: total,
                max: MAX_LINE_QUANTITY,
            });
        }

        self.lines
            .entry(product_id.clone())
            .and_modify(|line| line.quantity = existing + quantity)
            .or_insert_with(|| CartLine::new(product_id, quantity, unit_price));
        self.dirty = true;
        Ok(())
    }

    /// Remove a product's line from the cart.
    ///
    /// Removing an absent product is a no-op, not an error. Returns whether
    /// a line was actually removed; `dirty` is only set in that case.
    pub fn remove_line(&mut self, product_id: &ProductId) -> bool {
        let removed = self.lines.remove(product_id).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Merge the server's cart into this one.
    ///
    /// For product ids present on both sides the quantities are summed
    /// (additions made while offline are preserved), clamped at the line
    /// cap; the server's price snapshot wins. One-sided lines are kept
    /// as-is. The origin becomes [`CartOrigin::Merged`], and `dirty`
    /// reflects whether the merged view still differs from the server's.
    pub fn merge_from_server(&mut self, server_lines: Vec<CartLine>) {
        let server: BTreeMap<ProductId, CartLine> = server_lines
            .into_iter()
            .map(|line| (line.product_id.clone(), line))
            .collect();

        let mut merged = server.clone();
        for (product_id, local) in &self.lines {
            match merged.get_mut(product_id) {
                Some(line) => {
                    line.quantity = line
                        .quantity
                        .saturating_add(local.quantity)
                        .min(MAX_LINE_QUANTITY);
                }
                None => {
                    merged.insert(product_id.clone(), local.clone());
                }
            }
        }

        self.dirty = merged != server;
        self.lines = merged;
        self.origin = CartOrigin::Merged;
    }

    /// Mark the current state as persisted to the server.
    pub const fn mark_synced(&mut self) {
        self.dirty = false;
    }

    /// The cart's lines, ordered by product id.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    /// Snapshot the cart's lines, ordered by product id.
    #[must_use]
    pub fn to_lines(&self) -> Vec<CartLine> {
        self.lines.values().cloned().collect()
    }

    /// Quantity of a product, if present.
    #[must_use]
    pub fn quantity(&self, product_id: &ProductId) -> Option<u32> {
        self.lines.get(product_id).map(|line| line.quantity)
    }

    /// Number of distinct lines in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Where this state came from.
    #[must_use]
    pub const fn origin(&self) -> CartOrigin {
        self.origin
    }

    /// Whether unpersisted local mutations exist.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn price(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2))
    }

    fn line(id: &str, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(id), quantity, price(1999))
    }

    #[test]
    fn test_new_cart_is_local_and_clean() {
        let cart = CartState::new();
        assert!(cart.is_empty());
        assert_eq!(cart.origin(), CartOrigin::Local);
        assert!(!cart.is_dirty());
    }

    #[test]
    fn test_add_line_sums_quantities() {
        let mut cart = CartState::new();
        cart.add_line(ProductId::new("X123"), 2, price(1999))
            .expect("add");
        cart.add_line(ProductId::new("X123"), 3, price(1999))
            .expect("add again");

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity(&ProductId::new("X123")), Some(5));
        assert!(cart.is_dirty());
    }

    #[test]
    fn test_add_line_zero_quantity_rejected_without_mutation() {
        let mut cart = CartState::new();
        let err = cart
            .add_line(ProductId::new("X123"), 0, price(1999))
            .expect_err("zero quantity");
        assert!(matches!(err, CartError::InvalidQuantity { quantity: 0 }));
        assert!(cart.is_empty());
        assert!(!cart.is_dirty());
    }

    #[test]
    fn test_add_line_enforces_quantity_cap() {
        let mut cart = CartState::new();
        cart.add_line(ProductId::new("X123"), 98, price(1999))
            .expect("add");
        cart.add_line(ProductId::new("X123"), 1, price(1999))
            .expect("exactly at cap");

        let err = cart
            .add_line(ProductId::new("X123"), 1, price(1999))
            .expect_err("over cap");
        assert!(matches!(
            err,
            CartError::QuantityLimitExceeded {
                requested: 100,
                max: MAX_LINE_QUANTITY,
                ..
            }
        ));
        // The failed add must not have touched the line
        assert_eq!(cart.quantity(&ProductId::new("X123")), Some(99));
    }

    #[test]
    fn test_add_line_near_u32_max_reports_true_total() {
        let mut cart = CartState::new();
        cart.add_line(ProductId::new("X123"), 90, price(1999))
            .expect("add");

        let err = cart
            .add_line(ProductId::new("X123"), u32::MAX, price(1999))
            .expect_err("far over cap");
        match err {
            CartError::QuantityLimitExceeded { requested, max, .. } => {
                assert_eq!(requested, 90 + u64::from(u32::MAX));
                assert_eq!(max, MAX_LINE_QUANTITY);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cart.quantity(&ProductId::new("X123")), Some(90));
    }

    #[test]
    fn test_remove_line_absent_is_noop() {
        let mut cart = CartState::new();
        assert!(!cart.remove_line(&ProductId::new("ghost")));
        assert!(!cart.is_dirty());

        cart.add_line(ProductId::new("X123"), 1, price(1999))
            .expect("add");
        cart.mark_synced();
        assert!(cart.remove_line(&ProductId::new("X123")));
        assert!(cart.is_dirty());
    }

    #[test]
    fn test_no_sequence_of_edits_produces_duplicates_or_zero_quantities() {
        let mut cart = CartState::new();
        let ids = ["A", "B", "A", "C", "B", "A"];
        for id in ids {
            cart.add_line(ProductId::new(id), 1, price(500)).expect("add");
        }
        cart.remove_line(&ProductId::new("C"));
        cart.add_line(ProductId::new("C"), 2, price(500)).expect("add");

        let mut seen = std::collections::HashSet::new();
        for line in cart.lines() {
            assert!(line.quantity >= 1);
            assert!(seen.insert(line.product_id.clone()), "duplicate product id");
        }
        assert_eq!(cart.quantity(&ProductId::new("A")), Some(3));
        assert_eq!(cart.quantity(&ProductId::new("C")), Some(2));
    }

    #[test]
    fn test_merge_sums_shared_lines_and_keeps_one_sided_lines() {
        // local {A:2} + server {A:3, B:1} => {A:5, B:1}
        let mut cart = CartState::new();
        cart.add_line(ProductId::new("A"), 2, price(1000)).expect("add");

        cart.merge_from_server(vec![line("A", 3), line("B", 1)]);

        assert_eq!(cart.quantity(&ProductId::new("A")), Some(5));
        assert_eq!(cart.quantity(&ProductId::new("B")), Some(1));
        assert_eq!(cart.origin(), CartOrigin::Merged);
        assert!(cart.is_dirty());
    }

    #[test]
    fn test_merge_server_price_snapshot_wins_for_shared_lines() {
        let mut cart = CartState::new();
        cart.add_line(ProductId::new("A"), 2, price(1000)).expect("add");

        cart.merge_from_server(vec![CartLine::new(ProductId::new("A"), 1, price(1250))]);

        let merged = cart.to_lines();
        assert_eq!(merged.len(), 1);
        let first = merged.first().expect("one line");
        assert_eq!(first.unit_price_snapshot, price(1250));
        assert_eq!(first.quantity, 3);
    }

    #[test]
    fn test_merge_clamps_at_line_cap() {
        let mut cart = CartState::new();
        cart.add_line(ProductId::new("A"), 60, price(1000)).expect("add");

        cart.merge_from_server(vec![line("A", 60)]);

        assert_eq!(cart.quantity(&ProductId::new("A")), Some(MAX_LINE_QUANTITY));
    }

    #[test]
    fn test_merge_with_empty_local_cart_is_clean() {
        let mut cart = CartState::new();
        cart.merge_from_server(vec![line("A", 3), line("B", 1)]);

        assert_eq!(cart.origin(), CartOrigin::Merged);
        // Nothing local to push back to the server
        assert!(!cart.is_dirty());
    }

    #[test]
    fn test_from_lines_restores_clean_local_cart() {
        let cart = CartState::from_lines(vec![line("A", 2), line("B", 1)]);
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.origin(), CartOrigin::Local);
        assert!(!cart.is_dirty());
    }

    #[test]
    fn test_cart_line_wire_format() {
        let line = CartLine::new(ProductId::new("X123"), 2, price(1999));
        let json = serde_json::to_value(&line).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "productId": "X123",
                "quantity": 2,
                "unitPriceSnapshot": "19.99",
            })
        );
    }
}
