use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{FinalizedOrder, OrderDraft, Promotion};
use crate::domain::ports::OrderStore;
use crate::schema::{finalized_orders, order_drafts};

use super::models::{DraftRow, FinalizedOrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Persistence(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Persistence(e.to_string())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

pub struct DieselOrderStore {
    pool: DbPool,
}

impl DieselOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for DieselOrderStore {
    fn create_draft(&self, draft: &OrderDraft) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(order_drafts::table)
            .values(&DraftRow::try_from(draft)?)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_draft(&self, draft_id: Uuid) -> Result<Option<OrderDraft>, DomainError> {
        let mut conn = self.pool.get()?;
        order_drafts::table
            .filter(order_drafts::draft_id.eq(draft_id))
            .select(DraftRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(OrderDraft::try_from)
            .transpose()
    }

    fn find_order(&self, payment_session_id: &str) -> Result<Option<FinalizedOrder>, DomainError> {
        let mut conn = self.pool.get()?;
        finalized_orders::table
            .filter(finalized_orders::payment_session_id.eq(payment_session_id))
            .select(FinalizedOrderRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(FinalizedOrder::try_from)
            .transpose()
    }

    fn promote(&self, order: &FinalizedOrder) -> Result<Promotion, DomainError> {
        let row = FinalizedOrderRow::try_from(order)?;
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // Concurrent deliveries race here; the primary key picks one winner.
            let inserted = diesel::insert_into(finalized_orders::table)
                .values(&row)
                .on_conflict(finalized_orders::payment_session_id)
                .do_nothing()
                .execute(conn)?;
            if inserted == 0 {
                return Ok(Promotion::AlreadyExists);
            }

            diesel::delete(order_drafts::table.filter(order_drafts::draft_id.eq(order.draft_id)))
                .execute(conn)?;
            Ok(Promotion::Created)
        })
    }
}
