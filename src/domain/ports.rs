use std::sync::Arc;

use uuid::Uuid;

use super::cart::{CartIdentity, CartLineItem};
use super::errors::DomainError;
use super::order::{FinalizedOrder, OrderDraft, Promotion};
use super::payment::{Notification, PaymentSession, PaymentSessionRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCart {
    pub items: Vec<CartLineItem>,
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartWrite {
    Applied,
    /// A newer version is already stored; nothing was written.
    Stale,
}

/// Durable cart snapshots keyed by identity.
pub trait CartRepository: Send + Sync + 'static {
    fn load(&self, identity: &CartIdentity) -> Result<Option<StoredCart>, DomainError>;
    /// Full replace, applied only when `version` is newer than the stored one.
    fn save(
        &self,
        identity: &CartIdentity,
        version: i64,
        items: &[CartLineItem],
    ) -> Result<CartWrite, DomainError>;
}

/// Drafts keyed by draft id and finalized orders keyed by payment session id.
pub trait OrderStore: Send + Sync + 'static {
    /// Create-only; an existing draft id is an error.
    fn create_draft(&self, draft: &OrderDraft) -> Result<(), DomainError>;
    fn find_draft(&self, draft_id: Uuid) -> Result<Option<OrderDraft>, DomainError>;
    fn find_order(&self, payment_session_id: &str) -> Result<Option<FinalizedOrder>, DomainError>;
    /// Creates the order unless one already exists under the same session id
    /// and deletes the source draft, atomically.
    fn promote(&self, order: &FinalizedOrder) -> Result<Promotion, DomainError>;
}

pub trait PaymentGateway: Send + Sync + 'static {
    fn create_session(&self, request: &PaymentSessionRequest) -> Result<PaymentSession, DomainError>;
}

pub trait Notifier: Send + Sync + 'static {
    fn send(&self, notification: &Notification) -> Result<(), DomainError>;
}

impl<T: CartRepository + ?Sized> CartRepository for Arc<T> {
    fn load(&self, identity: &CartIdentity) -> Result<Option<StoredCart>, DomainError> {
        (**self).load(identity)
    }

    fn save(
        &self,
        identity: &CartIdentity,
        version: i64,
        items: &[CartLineItem],
    ) -> Result<CartWrite, DomainError> {
        (**self).save(identity, version, items)
    }
}

impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    fn create_draft(&self, draft: &OrderDraft) -> Result<(), DomainError> {
        (**self).create_draft(draft)
    }

    fn find_draft(&self, draft_id: Uuid) -> Result<Option<OrderDraft>, DomainError> {
        (**self).find_draft(draft_id)
    }

    fn find_order(&self, payment_session_id: &str) -> Result<Option<FinalizedOrder>, DomainError> {
        (**self).find_order(payment_session_id)
    }

    fn promote(&self, order: &FinalizedOrder) -> Result<Promotion, DomainError> {
        (**self).promote(order)
    }
}

impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    fn create_session(&self, request: &PaymentSessionRequest) -> Result<PaymentSession, DomainError> {
        (**self).create_session(request)
    }
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn send(&self, notification: &Notification) -> Result<(), DomainError> {
        (**self).send(notification)
    }
}
