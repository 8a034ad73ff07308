use std::sync::Arc;

use crate::domain::cart::{Cart, CartItemUpdate, CartLineItem, LineKey};
use crate::domain::catalog::Product;
use crate::domain::errors::ValidationError;
use crate::domain::pricing::PromoTable;

/// Holds the active session's cart. Each mutation swaps in a fresh
/// snapshot, so a reader holding an earlier `Arc<Cart>` never observes a
/// partially applied change.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    current: Arc<Cart>,
}

impl CartStore {
    pub fn new(cart: Cart) -> Self {
        Self {
            current: Arc::new(cart),
        }
    }

    pub fn snapshot(&self) -> Arc<Cart> {
        Arc::clone(&self.current)
    }

    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        size: Option<&str>,
        description: Option<&str>,
    ) -> Result<Arc<Cart>, ValidationError> {
        let next = self.current.added(CartLineItem {
            product_id: product.id.clone(),
            size: size.map(str::to_string),
            description: description.map(str::to_string),
            quantity,
            unit_price_minor: product.base_price_minor,
        })?;
        Ok(self.replace(next))
    }

    pub fn update_quantity(&mut self, key: &LineKey, quantity: u32) -> Arc<Cart> {
        if quantity < 1 {
            return self.snapshot();
        }
        let next = self.current.with_quantity(key, quantity);
        self.replace(next)
    }

    pub fn remove(&mut self, key: &LineKey) -> Arc<Cart> {
        let next = self.current.without(key);
        self.replace(next)
    }

    pub fn update_fields(
        &mut self,
        key: &LineKey,
        update: &CartItemUpdate,
    ) -> Result<Arc<Cart>, ValidationError> {
        let next = self.current.with_fields(key, update)?;
        Ok(self.replace(next))
    }

    pub fn clear(&mut self) -> Arc<Cart> {
        let next = self.current.cleared();
        self.replace(next)
    }

    /// Only one code may be active; a second one is rejected, not swapped.
    pub fn apply_promo(&mut self, code: &str, promos: &PromoTable) -> Result<Arc<Cart>, ValidationError> {
        if self.current.promo_code.is_some() {
            return Err(ValidationError::DuplicatePromo);
        }
        let (canonical, _) = promos.lookup(code)?;
        let next = self.current.with_promo(canonical)?;
        Ok(self.replace(next))
    }

    pub fn remove_promo(&mut self) -> Arc<Cart> {
        let next = self.current.without_promo();
        self.replace(next)
    }

    pub fn replace(&mut self, cart: Cart) -> Arc<Cart> {
        self.current = Arc::new(cart);
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Catalog;

    fn personalized() -> Product {
        Catalog::default()
            .get("personalized")
            .cloned()
            .expect("catalog has personalized")
    }

    #[test]
    fn add_snapshots_the_base_price() {
        let mut store = CartStore::default();
        let cart = store
            .add(&personalized(), 1, Some("iPhone 15"), Some("my cat"))
            .expect("add succeeds");
        assert_eq!(cart.items[0].unit_price_minor, 2599);
        assert_eq!(cart.items[0].description.as_deref(), Some("my cat"));
    }

    #[test]
    fn earlier_snapshots_are_not_affected_by_later_mutations() {
        let mut store = CartStore::default();
        let before = store.add(&personalized(), 1, None, None).expect("add succeeds");
        let after = store
            .update_quantity(&LineKey::new("personalized", None, None), 4);
        assert_eq!(before.items[0].quantity, 1);
        assert_eq!(after.items[0].quantity, 4);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn update_quantity_to_zero_keeps_the_same_snapshot() {
        let mut store = CartStore::default();
        let before = store.add(&personalized(), 2, None, None).expect("add succeeds");
        let after = store.update_quantity(&LineKey::new("personalized", None, None), 0);
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn promo_rules() {
        let promos = PromoTable::new([("SAVE10".to_string(), 10), ("SAVE20".to_string(), 20)]);
        let mut store = CartStore::default();
        assert_eq!(
            store.apply_promo("NOPE", &promos).map(|c| c.promo_code.clone()),
            Err(ValidationError::UnknownPromo)
        );
        let cart = store.apply_promo("save10", &promos).expect("first promo applies");
        assert_eq!(cart.promo_code.as_deref(), Some("SAVE10"));
        assert_eq!(
            store.apply_promo("SAVE20", &promos).map(|c| c.promo_code.clone()),
            Err(ValidationError::DuplicatePromo)
        );
        assert!(store.remove_promo().promo_code.is_none());
        assert!(store.apply_promo("SAVE20", &promos).is_ok());
    }

    #[test]
    fn clear_empties_items_and_promo() {
        let promos = PromoTable::new([("SAVE10".to_string(), 10)]);
        let mut store = CartStore::default();
        store.add(&personalized(), 1, None, None).expect("add succeeds");
        store.apply_promo("SAVE10", &promos).expect("promo applies");
        let cart = store.clear();
        assert!(cart.is_empty());
        assert!(cart.promo_code.is_none());
    }
}
