use std::collections::BTreeMap;

use super::money::CurrencyCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLineItem {
    pub name: String,
    pub image_url: Option<String>,
    pub unit_amount_minor: i64,
    pub quantity: u32,
}

/// Outbound request for a hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSessionRequest {
    pub currency: CurrencyCode,
    pub line_items: Vec<PaymentLineItem>,
    pub shipping_line: PaymentLineItem,
    pub customer_email: String,
    /// Echoed back by the processor on completion; carries `draft_id`.
    pub metadata: BTreeMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl PaymentSessionRequest {
    pub fn total_minor(&self) -> i64 {
        self.line_items
            .iter()
            .chain(std::iter::once(&self.shipping_line))
            .map(|l| l.unit_amount_minor * i64::from(l.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub reply_to: Option<String>,
}
