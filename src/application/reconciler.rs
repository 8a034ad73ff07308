//! Turns signed payment-completion deliveries into finalized orders.
//!
//! Deliveries are at-least-once and may be concurrent. The order store's
//! conditional create decides which delivery finalizes an order; only that
//! one sends the confirmation email. Every other delivery for the same
//! session is acknowledged as a duplicate.

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::confirmation::confirmation_email;
use super::webhook::{parse_event, PaymentEvent, WebhookVerifier};
use crate::domain::errors::DomainError;
use crate::domain::order::{FinalizedOrder, Promotion};
use crate::domain::ports::{Notifier, OrderStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Finalized { session_id: String },
    AlreadyFinalized { session_id: String },
    Ignored { event_type: String },
}

pub struct OrderReconciler<S, N> {
    store: S,
    notifier: N,
    verifier: WebhookVerifier,
}

impl<S: OrderStore, N: Notifier> OrderReconciler<S, N> {
    pub fn new(store: S, notifier: N, verifier: WebhookVerifier) -> Self {
        Self {
            store,
            notifier,
            verifier,
        }
    }

    pub fn find_order(&self, session_id: &str) -> Result<FinalizedOrder, DomainError> {
        self.store
            .find_order(session_id)?
            .ok_or(DomainError::NotFound)
    }

    /// Errors map to non-2xx responses so the processor redelivers, except
    /// for a failed confirmation email, which is logged and acknowledged.
    pub fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<ReconcileOutcome, DomainError> {
        let header = signature.ok_or_else(|| {
            log::warn!("Rejected payment webhook without signature header");
            DomainError::InvalidSignature("missing signature header".to_string())
        })?;
        if let Err(e) = self.verifier.verify(payload, header, Utc::now().timestamp()) {
            log::warn!("Rejected payment webhook: {e}");
            return Err(e);
        }

        let completion = match parse_event(payload)? {
            PaymentEvent::Completed(completion) => completion,
            PaymentEvent::Other(event_type) => {
                log::debug!("Ignoring payment event {event_type}");
                return Ok(ReconcileOutcome::Ignored { event_type });
            }
        };
        let session_id = completion.session_id.clone();

        let Some(raw_draft_id) = completion.draft_id.as_deref() else {
            log::error!("Payment session {session_id} completed without a draft id");
            return Err(DomainError::MissingCorrelation);
        };

        if self.store.find_order(&session_id)?.is_some() {
            log::info!("Duplicate delivery for payment session {session_id}");
            return Ok(ReconcileOutcome::AlreadyFinalized { session_id });
        }

        let draft_id = Uuid::parse_str(raw_draft_id).ok();
        let draft = match draft_id.map(|id| self.store.find_draft(id)).transpose()?.flatten() {
            Some(draft) => draft,
            // A concurrent delivery may have promoted the draft since the
            // order lookup above.
            None if self.store.find_order(&session_id)?.is_some() => {
                log::info!("Duplicate delivery for payment session {session_id}");
                return Ok(ReconcileOutcome::AlreadyFinalized { session_id });
            }
            None => {
                log::error!(
                    "Payment session {session_id} references missing draft {raw_draft_id}"
                );
                return Err(DomainError::ReconciliationInconsistency(format!(
                    "draft {raw_draft_id} not found for session {session_id}"
                )));
            }
        };

        let order = FinalizedOrder::promote(draft, &completion, Utc::now());
        match self.store.promote(&order)? {
            Promotion::Created => {
                log::info!(
                    "Finalized order {session_id} from draft {} ({} {})",
                    order.draft_id,
                    order.amount_total_minor,
                    completion.currency
                );
                self.notify(&order);
                Ok(ReconcileOutcome::Finalized { session_id })
            }
            Promotion::AlreadyExists => {
                log::info!("Duplicate delivery for payment session {session_id}");
                Ok(ReconcileOutcome::AlreadyFinalized { session_id })
            }
        }
    }

    fn notify(&self, order: &FinalizedOrder) {
        let mail = match confirmation_email(order) {
            Ok(Some(mail)) => mail,
            Ok(None) => {
                log::warn!(
                    "Order {} has no contact address; skipping confirmation",
                    order.payment_session_id
                );
                return;
            }
            Err(e) => {
                log::error!(
                    "Confirmation email for order {} could not be built: {e}",
                    order.payment_session_id
                );
                return;
            }
        };
        if let Err(e) = self.notifier.send(&mail) {
            log::error!(
                "Confirmation email for order {} failed: {e}",
                order.payment_session_id
            );
        }
    }
}
