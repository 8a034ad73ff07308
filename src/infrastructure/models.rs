use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::cart::CartLineItem;
use crate::domain::errors::DomainError;
use crate::domain::money::CurrencyCode;
use crate::domain::order::{FinalizedOrder, OrderDraft};
use crate::schema::{carts, finalized_orders, order_drafts};

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, DomainError> {
    serde_json::to_value(value).map_err(|e| DomainError::Persistence(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| DomainError::Persistence(e.to_string()))
}

fn currency(code: &str) -> Result<CurrencyCode, DomainError> {
    code.parse()
        .map_err(|_| DomainError::Persistence(format!("unknown stored currency {code}")))
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartRow {
    pub identity: String,
    pub items: Value,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl CartRow {
    pub fn new(identity: String, version: i64, items: &[CartLineItem]) -> Result<Self, DomainError> {
        Ok(Self {
            identity,
            items: to_json(items)?,
            version,
            updated_at: Utc::now(),
        })
    }

    pub fn items(self) -> Result<Vec<CartLineItem>, DomainError> {
        from_json(self.items)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = order_drafts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DraftRow {
    pub draft_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub currency: String,
    pub shipping_info: Value,
    pub shipping_cost_minor: i64,
    pub shipping_method: String,
    pub line_items: Value,
    pub promo_code: Option<String>,
    pub discount_minor: i64,
    pub total_minor: i64,
}

impl TryFrom<&OrderDraft> for DraftRow {
    type Error = DomainError;

    fn try_from(d: &OrderDraft) -> Result<Self, Self::Error> {
        Ok(Self {
            draft_id: d.draft_id,
            created_at: d.created_at,
            currency: d.currency.as_str().to_string(),
            shipping_info: to_json(&d.shipping_info)?,
            shipping_cost_minor: d.shipping_cost_minor,
            shipping_method: d.shipping_method.clone(),
            line_items: to_json(&d.line_items)?,
            promo_code: d.promo_code.clone(),
            discount_minor: d.discount_minor,
            total_minor: d.total_minor,
        })
    }
}

impl TryFrom<DraftRow> for OrderDraft {
    type Error = DomainError;

    fn try_from(r: DraftRow) -> Result<Self, Self::Error> {
        Ok(Self {
            draft_id: r.draft_id,
            created_at: r.created_at,
            currency: currency(&r.currency)?,
            shipping_info: from_json(r.shipping_info)?,
            shipping_cost_minor: r.shipping_cost_minor,
            shipping_method: r.shipping_method,
            line_items: from_json(r.line_items)?,
            promo_code: r.promo_code,
            discount_minor: r.discount_minor,
            total_minor: r.total_minor,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = finalized_orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FinalizedOrderRow {
    pub payment_session_id: String,
    pub draft_id: Uuid,
    pub draft_created_at: DateTime<Utc>,
    pub currency: String,
    pub shipping_info: Value,
    pub shipping_cost_minor: i64,
    pub shipping_method: String,
    pub line_items: Value,
    pub promo_code: Option<String>,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub amount_total_minor: i64,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
}

impl TryFrom<&FinalizedOrder> for FinalizedOrderRow {
    type Error = DomainError;

    fn try_from(o: &FinalizedOrder) -> Result<Self, Self::Error> {
        Ok(Self {
            payment_session_id: o.payment_session_id.clone(),
            draft_id: o.draft_id,
            draft_created_at: o.draft_created_at,
            currency: o.currency.as_str().to_string(),
            shipping_info: to_json(&o.shipping_info)?,
            shipping_cost_minor: o.shipping_cost_minor,
            shipping_method: o.shipping_method.clone(),
            line_items: to_json(&o.line_items)?,
            promo_code: o.promo_code.clone(),
            discount_minor: o.discount_minor,
            total_minor: o.total_minor,
            amount_total_minor: o.amount_total_minor,
            payment_status: o.payment_status.clone(),
            customer_email: o.customer_email.clone(),
            paid_at: o.paid_at,
            finalized_at: o.finalized_at,
        })
    }
}

impl TryFrom<FinalizedOrderRow> for FinalizedOrder {
    type Error = DomainError;

    fn try_from(r: FinalizedOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            payment_session_id: r.payment_session_id,
            draft_id: r.draft_id,
            draft_created_at: r.draft_created_at,
            currency: currency(&r.currency)?,
            shipping_info: from_json(r.shipping_info)?,
            shipping_cost_minor: r.shipping_cost_minor,
            shipping_method: r.shipping_method,
            line_items: from_json(r.line_items)?,
            promo_code: r.promo_code,
            discount_minor: r.discount_minor,
            total_minor: r.total_minor,
            amount_total_minor: r.amount_total_minor,
            payment_status: r.payment_status,
            customer_email: r.customer_email,
            paid_at: r.paid_at,
            finalized_at: r.finalized_at,
        })
    }
}
