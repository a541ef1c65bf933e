//! Per-customer item collections: the cart and the wishlist.
//!
//! Both are sets of entries keyed by product. They differ only in what happens
//! when a product that is already present is added again:
//!
//! - **Cart**: the quantities merge (2 + 3 → one entry with quantity 5).
//! - **Wishlist**: nothing changes and the add reports `added = false`.
//!
//! That difference lives in [`CollectionEntry::absorb`]; everything else is
//! shared by [`ItemCollection`].
//!
//! Whether the referenced product exists is checked by the caller before any
//! of these operations run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AggregateError;
use crate::types::ProductId;

/// An entry that can live in an [`ItemCollection`].
pub trait CollectionEntry {
    /// Product this entry refers to. At most one entry per product.
    fn product_id(&self) -> ProductId;

    /// Fold a duplicate add of the same product into `self`.
    ///
    /// Returns whether the add counts as having added something.
    fn absorb(&mut self, incoming: Self) -> bool
    where
        Self: Sized;
}

/// Result of [`ItemCollection::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    /// `false` when the product was already present and nothing changed.
    pub added: bool,
}

/// Result of [`ItemCollection::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemoveOutcome {
    /// `false` when the product was not in the collection.
    pub removed: bool,
}

/// Result of [`ItemCollection::clear`]. Clearing always succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    /// Always `true`.
    pub cleared: bool,
}

/// A set of entries keyed by product, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ItemCollection<E> {
    entries: Vec<E>,
}

impl<E> Default for ItemCollection<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: CollectionEntry> ItemCollection<E> {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from persisted entries.
    ///
    /// Later duplicates of a product are absorbed into the first one, so the
    /// one-entry-per-product invariant holds even for inconsistent input.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = E>) -> Self {
        let mut collection = Self::new();
        for entry in entries {
            collection.add(entry);
        }
        collection
    }

    /// Add an entry, applying the entry type's duplicate policy.
    pub fn add(&mut self, entry: E) -> AddOutcome {
        let product_id = entry.product_id();
        match self.get_mut(product_id) {
            Some(existing) => AddOutcome {
                added: existing.absorb(entry),
            },
            None => {
                self.entries.push(entry);
                AddOutcome { added: true }
            }
        }
    }

    /// Remove the entry for `product_id`, if any.
    pub fn remove(&mut self, product_id: ProductId) -> RemoveOutcome {
        let before = self.entries.len();
        self.entries.retain(|e| e.product_id() != product_id);
        RemoveOutcome {
            removed: self.entries.len() != before,
        }
    }

    /// Whether `product_id` is in the collection.
    #[must_use]
    pub fn has(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Remove every entry.
    pub fn clear(&mut self) -> ClearOutcome {
        self.entries.clear();
        ClearOutcome { cleared: true }
    }

    /// Number of distinct products.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `product_id`.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&E> {
        self.entries.iter().find(|e| e.product_id() == product_id)
    }

    fn get_mut(&mut self, product_id: ProductId) -> Option<&mut E> {
        self.entries
            .iter_mut()
            .find(|e| e.product_id() == product_id)
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[E] {
        &self.entries
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Number of units of a product in a cart line. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// One unit.
    pub const ONE: Self = Self(1);

    /// Validate a quantity.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidValue` for zero.
    pub fn new(value: u32) -> Result<Self, AggregateError> {
        if value == 0 {
            return Err(AggregateError::invalid("quantity", "must be at least 1"));
        }
        Ok(Self(value))
    }

    /// The quantity as a plain number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Sum of two quantities, saturating at `u32::MAX`.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = AggregateError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product in the cart.
    pub product_id: ProductId,
    /// Units requested.
    pub quantity: Quantity,
    /// Selected color, if the product has variants.
    pub color: Option<String>,
    /// Selected size, if the product has variants.
    pub size: Option<String>,
    /// When the product first entered the cart.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// A new cart line added now.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            product_id,
            quantity,
            color: None,
            size: None,
            added_at: Utc::now(),
        }
    }

    /// Set the variant attributes.
    #[must_use]
    pub fn with_variant(mut self, color: Option<String>, size: Option<String>) -> Self {
        self.color = color;
        self.size = size;
        self
    }
}

impl CollectionEntry for CartItem {
    fn product_id(&self) -> ProductId {
        self.product_id
    }

    fn absorb(&mut self, incoming: Self) -> bool {
        self.quantity = self.quantity.merge(incoming.quantity);
        // A later add with explicit attributes wins over the earlier selection.
        if incoming.color.is_some() {
            self.color = incoming.color;
        }
        if incoming.size.is_some() {
            self.size = incoming.size;
        }
        true
    }
}

/// The contents of a customer's cart.
pub type CartItems = ItemCollection<CartItem>;

impl ItemCollection<CartItem> {
    /// Replace the quantity of an existing line. A quantity of zero removes it.
    ///
    /// Returns `false` if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        match Quantity::new(quantity) {
            Ok(quantity) => self.get_mut(product_id).is_some_and(|item| {
                item.quantity = quantity;
                true
            }),
            Err(_) => self.remove(product_id).removed,
        }
    }

    /// Units across every line.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.entries
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// One product saved to a wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    /// Saved product.
    pub product_id: ProductId,
    /// When it was saved.
    pub added_at: DateTime<Utc>,
}

impl WishlistItem {
    /// A wishlist entry saved now.
    #[must_use]
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            added_at: Utc::now(),
        }
    }
}

impl CollectionEntry for WishlistItem {
    fn product_id(&self) -> ProductId {
        self.product_id
    }

    fn absorb(&mut self, _incoming: Self) -> bool {
        false
    }
}

/// The contents of a customer's wishlist.
pub type WishlistItems = ItemCollection<WishlistItem>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    const P1: ProductId = ProductId::new(1);
    const P2: ProductId = ProductId::new(2);

    #[test]
    fn test_wishlist_add_then_remove() {
        let mut wishlist = WishlistItems::new();
        assert!(wishlist.add(WishlistItem::new(P1)).added);
        assert_eq!(wishlist.count(), 1);

        assert!(wishlist.remove(P1).removed);
        assert_eq!(wishlist.count(), 0);
        assert!(!wishlist.has(P1));
    }

    #[test]
    fn test_wishlist_duplicate_is_noop() {
        let mut wishlist = WishlistItems::new();
        let first = wishlist.add(WishlistItem::new(P1));
        let second = wishlist.add(WishlistItem::new(P1));

        assert!(first.added);
        assert!(!second.added);
        assert_eq!(wishlist.count(), 1);
    }

    #[test]
    fn test_cart_duplicate_merges_quantity() {
        let mut cart = CartItems::new();
        cart.add(CartItem::new(P1, qty(2)));
        let outcome = cart.add(CartItem::new(P1, qty(3)));

        assert!(outcome.added);
        assert_eq!(cart.count(), 1);
        assert_eq!(cart.get(P1).unwrap().quantity.get(), 5);
    }

    #[test]
    fn test_cart_merge_keeps_original_added_at() {
        let mut cart = CartItems::new();
        let first = CartItem::new(P1, qty(1));
        let added_at = first.added_at;
        cart.add(first);
        cart.add(CartItem::new(P1, qty(1)).with_variant(Some("red".into()), None));

        let item = cart.get(P1).unwrap();
        assert_eq!(item.added_at, added_at);
        assert_eq!(item.color.as_deref(), Some("red"));
    }

    #[test]
    fn test_count_is_distinct_products_not_units() {
        let mut cart = CartItems::new();
        cart.add(CartItem::new(P1, qty(4)));
        cart.add(CartItem::new(P2, qty(6)));

        assert_eq!(cart.count(), 2);
        assert_eq!(cart.total_quantity(), 10);
    }

    #[test]
    fn test_remove_missing_reports_false() {
        let mut wishlist = WishlistItems::new();
        assert!(!wishlist.remove(P1).removed);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut wishlist = WishlistItems::new();
        wishlist.add(WishlistItem::new(P1));
        wishlist.add(WishlistItem::new(P2));

        assert!(wishlist.clear().cleared);
        assert!(wishlist.clear().cleared);
        assert_eq!(wishlist.count(), 0);
        assert!(wishlist.is_empty());
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = CartItems::new();
        cart.add(CartItem::new(P1, qty(2)));

        assert!(cart.set_quantity(P1, 7));
        assert_eq!(cart.get(P1).unwrap().quantity.get(), 7);

        assert!(!cart.set_quantity(P2, 1));

        assert!(cart.set_quantity(P1, 0));
        assert!(!cart.has(P1));
    }

    #[test]
    fn test_from_entries_collapses_duplicates() {
        let cart = CartItems::from_entries([
            CartItem::new(P1, qty(1)),
            CartItem::new(P2, qty(1)),
            CartItem::new(P1, qty(2)),
        ]);
        assert_eq!(cart.count(), 2);
        assert_eq!(cart.get(P1).unwrap().quantity.get(), 3);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut wishlist = WishlistItems::new();
        wishlist.add(WishlistItem::new(P2));
        wishlist.add(WishlistItem::new(P1));
        let ids: Vec<_> = wishlist.entries().iter().map(|e| e.product_id).collect();
        assert_eq!(ids, vec![P2, P1]);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(Quantity::new(0).is_err());
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
