use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::country::CountryCode;
use super::money::CurrencyCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PostalAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: CountryCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address: PostalAddress,
}

/// Cart entry frozen at draft time with its price in the display currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DraftLineItem {
    pub product_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price_minor: i64,
}

impl DraftLineItem {
    pub fn line_total_minor(&self) -> i64 {
        self.unit_price_minor * i64::from(self.quantity)
    }
}

/// Snapshot written before payment. Never mutated; deleted on promotion or
/// left behind when the shopper abandons payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderDraft {
    pub draft_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub currency: CurrencyCode,
    pub shipping_info: ShippingInfo,
    pub shipping_cost_minor: i64,
    pub shipping_method: String,
    pub line_items: Vec<DraftLineItem>,
    pub promo_code: Option<String>,
    pub discount_minor: i64,
    pub total_minor: i64,
}

/// Payment fields reported by the processor when a session completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCompletion {
    pub session_id: String,
    pub draft_id: Option<String>,
    pub amount_total_minor: i64,
    pub currency: String,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Durable record of a paid order, keyed by the processor session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinalizedOrder {
    pub payment_session_id: String,
    pub draft_id: Uuid,
    pub draft_created_at: DateTime<Utc>,
    pub currency: CurrencyCode,
    pub shipping_info: ShippingInfo,
    pub shipping_cost_minor: i64,
    pub shipping_method: String,
    pub line_items: Vec<DraftLineItem>,
    pub promo_code: Option<String>,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub amount_total_minor: i64,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
}

impl FinalizedOrder {
    pub fn promote(draft: OrderDraft, payment: &PaymentCompletion, now: DateTime<Utc>) -> Self {
        Self {
            payment_session_id: payment.session_id.clone(),
            draft_id: draft.draft_id,
            draft_created_at: draft.created_at,
            currency: draft.currency,
            customer_email: payment
                .customer_email
                .clone()
                .or_else(|| Some(draft.shipping_info.email.clone())),
            shipping_info: draft.shipping_info,
            shipping_cost_minor: draft.shipping_cost_minor,
            shipping_method: draft.shipping_method,
            line_items: draft.line_items,
            promo_code: draft.promo_code,
            discount_minor: draft.discount_minor,
            total_minor: draft.total_minor,
            amount_total_minor: payment.amount_total_minor,
            payment_status: payment.payment_status.clone(),
            paid_at: payment.created_at,
            finalized_at: now,
        }
    }
}

/// Result of the conditional create behind order promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Created,
    AlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> OrderDraft {
        OrderDraft {
            draft_id: Uuid::new_v4(),
            created_at: Utc::now(),
            currency: CurrencyCode::Usd,
            shipping_info: ShippingInfo {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                address: PostalAddress {
                    line1: "1 Main St".to_string(),
                    line2: None,
                    city: "Springfield".to_string(),
                    state: "IL".to_string(),
                    postal_code: "62701".to_string(),
                    country: CountryCode::resolve("US").expect("US resolves"),
                },
            },
            shipping_cost_minor: 900,
            shipping_method: "Tracked International".to_string(),
            line_items: vec![DraftLineItem {
                product_id: "personalized".to_string(),
                name: "Personalized".to_string(),
                size: None,
                description: Some("cats".to_string()),
                quantity: 1,
                unit_price_minor: 2599,
            }],
            promo_code: None,
            discount_minor: 0,
            total_minor: 3499,
        }
    }

    #[test]
    fn promote_carries_draft_and_payment_fields() {
        let draft = draft();
        let draft_id = draft.draft_id;
        let payment = PaymentCompletion {
            session_id: "cs_test_1".to_string(),
            draft_id: Some(draft_id.to_string()),
            amount_total_minor: 3499,
            currency: "usd".to_string(),
            payment_status: "paid".to_string(),
            customer_email: None,
            created_at: Utc::now(),
        };
        let order = FinalizedOrder::promote(draft, &payment, Utc::now());
        assert_eq!(order.payment_session_id, "cs_test_1");
        assert_eq!(order.draft_id, draft_id);
        assert_eq!(order.amount_total_minor, 3499);
        assert_eq!(order.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(order.line_items[0].line_total_minor(), 2599);
    }
}
