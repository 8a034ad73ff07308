//! Process-local adapters for tests and running without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::domain::cart::{CartIdentity, CartLineItem};
use crate::domain::errors::DomainError;
use crate::domain::order::{FinalizedOrder, OrderDraft, Promotion};
use crate::domain::ports::{CartRepository, CartWrite, OrderStore, StoredCart};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug, Default)]
pub struct InMemoryCartRepository {
    carts: Mutex<HashMap<String, StoredCart>>,
}

impl CartRepository for InMemoryCartRepository {
    fn load(&self, identity: &CartIdentity) -> Result<Option<StoredCart>, DomainError> {
        Ok(lock(&self.carts).get(&identity.storage_key()).cloned())
    }

    fn save(
        &self,
        identity: &CartIdentity,
        version: i64,
        items: &[CartLineItem],
    ) -> Result<CartWrite, DomainError> {
        let mut carts = lock(&self.carts);
        let key = identity.storage_key();
        if carts.get(&key).is_some_and(|stored| stored.version >= version) {
            return Ok(CartWrite::Stale);
        }
        carts.insert(
            key,
            StoredCart {
                items: items.to_vec(),
                version,
            },
        );
        Ok(CartWrite::Applied)
    }
}

#[derive(Debug, Default)]
struct Orders {
    drafts: HashMap<Uuid, OrderDraft>,
    finalized: HashMap<String, FinalizedOrder>,
}

/// Drafts and finalized orders behind one lock, so promotion is atomic.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<Orders>,
}

impl InMemoryOrderStore {
    pub fn draft_count(&self) -> usize {
        lock(&self.inner).drafts.len()
    }

    pub fn order_count(&self) -> usize {
        lock(&self.inner).finalized.len()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn create_draft(&self, draft: &OrderDraft) -> Result<(), DomainError> {
        let mut inner = lock(&self.inner);
        if inner.drafts.contains_key(&draft.draft_id) {
            return Err(DomainError::Persistence(format!(
                "draft {} already exists",
                draft.draft_id
            )));
        }
        inner.drafts.insert(draft.draft_id, draft.clone());
        Ok(())
    }

    fn find_draft(&self, draft_id: Uuid) -> Result<Option<OrderDraft>, DomainError> {
        Ok(lock(&self.inner).drafts.get(&draft_id).cloned())
    }

    fn find_order(&self, payment_session_id: &str) -> Result<Option<FinalizedOrder>, DomainError> {
        Ok(lock(&self.inner).finalized.get(payment_session_id).cloned())
    }

    fn promote(&self, order: &FinalizedOrder) -> Result<Promotion, DomainError> {
        let mut inner = lock(&self.inner);
        if inner.finalized.contains_key(&order.payment_session_id) {
            return Ok(Promotion::AlreadyExists);
        }
        inner
            .finalized
            .insert(order.payment_session_id.clone(), order.clone());
        inner.drafts.remove(&order.draft_id);
        Ok(Promotion::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_save_ignores_older_and_equal_versions() {
        let repo = InMemoryCartRepository::default();
        let id = CartIdentity::Device("d".to_string());
        assert_eq!(repo.save(&id, 5, &[]).expect("save"), CartWrite::Applied);
        assert_eq!(repo.save(&id, 5, &[]).expect("save"), CartWrite::Stale);
        assert_eq!(repo.save(&id, 4, &[]).expect("save"), CartWrite::Stale);
        assert_eq!(repo.save(&id, 6, &[]).expect("save"), CartWrite::Applied);
        assert_eq!(repo.load(&id).expect("load").map(|c| c.version), Some(6));
    }

    #[test]
    fn device_and_account_records_are_separate() {
        let repo = InMemoryCartRepository::default();
        repo.save(&CartIdentity::Device("x".to_string()), 1, &[])
            .expect("save");
        assert!(repo
            .load(&CartIdentity::Account("x".to_string()))
            .expect("load")
            .is_none());
    }
}
