use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::DbPool;
use crate::domain::cart::{CartIdentity, CartLineItem};
use crate::domain::errors::DomainError;
use crate::domain::ports::{CartRepository, CartWrite, StoredCart};
use crate::schema::carts;

use super::models::CartRow;

pub struct DieselCartRepository {
    pool: DbPool,
}

impl DieselCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl CartRepository for DieselCartRepository {
    fn load(&self, identity: &CartIdentity) -> Result<Option<StoredCart>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = carts::table
            .filter(carts::identity.eq(identity.storage_key()))
            .select(CartRow::as_select())
            .first(&mut conn)
            .optional()?;

        row.map(|r| {
            let version = r.version;
            Ok(StoredCart {
                items: r.items()?,
                version,
            })
        })
        .transpose()
    }

    fn save(
        &self,
        identity: &CartIdentity,
        version: i64,
        items: &[CartLineItem],
    ) -> Result<CartWrite, DomainError> {
        let mut conn = self.pool.get()?;
        let row = CartRow::new(identity.storage_key(), version, items)?;

        let upsert = diesel::insert_into(carts::table)
            .values(&row)
            .on_conflict(carts::identity)
            .do_update()
            .set((
                carts::items.eq(excluded(carts::items)),
                carts::version.eq(excluded(carts::version)),
                carts::updated_at.eq(excluded(carts::updated_at)),
            ));
        // WHERE on the conflict branch: an older version updates zero rows.
        // The prelude's `QueryDsl::filter` does not apply to upserts.
        let affected = diesel::query_dsl::methods::FilterDsl::filter(
            upsert,
            carts::version.lt(excluded(carts::version)),
        )
        .execute(&mut conn)?;

        Ok(if affected == 0 {
            CartWrite::Stale
        } else {
            CartWrite::Applied
        })
    }
}
