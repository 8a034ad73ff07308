use askama::Template;

use crate::domain::errors::DomainError;
use crate::domain::money::Money;
use crate::domain::order::FinalizedOrder;
use crate::domain::payment::Notification;

struct ConfirmationLine<'a> {
    label: String,
    quantity: u32,
    total: String,
    description: Option<&'a str>,
}

/// Everything the confirmation templates print, preformatted.
struct Confirmation<'a> {
    name: &'a str,
    lines: Vec<ConfirmationLine<'a>>,
    promo_code: Option<&'a str>,
    discount: String,
    shipping_method: &'a str,
    shipping_cost: String,
    total_paid: String,
    line1: &'a str,
    line2: Option<&'a str>,
    city: &'a str,
    region: &'a str,
    postal_code: &'a str,
    country: &'static str,
    order_id: &'a str,
    payment_status: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct ConfirmationHtml<'a> {
    mail: &'a Confirmation<'a>,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct ConfirmationText<'a> {
    mail: &'a Confirmation<'a>,
}

/// Order confirmation for the shopper, or `None` when no address is known.
pub fn confirmation_email(order: &FinalizedOrder) -> Result<Option<Notification>, DomainError> {
    let Some(to) = order
        .customer_email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .or(Some(order.shipping_info.email.as_str()))
        .filter(|e| !e.trim().is_empty())
    else {
        return Ok(None);
    };

    let mail = Confirmation::from_order(order);
    Ok(Some(Notification {
        to: to.to_string(),
        subject: format!("Thanks for your order! (#{})", order.payment_session_id),
        text_body: ConfirmationText { mail: &mail }.render().map_err(render_error)?,
        html_body: ConfirmationHtml { mail: &mail }.render().map_err(render_error)?,
        reply_to: None,
    }))
}

impl<'a> Confirmation<'a> {
    fn from_order(order: &'a FinalizedOrder) -> Self {
        let money = |minor: i64| Money::new(minor, order.currency).format_major();
        let info = &order.shipping_info;
        let addr = &info.address;
        Self {
            name: &info.name,
            lines: order
                .line_items
                .iter()
                .map(|line| ConfirmationLine {
                    label: match &line.size {
                        Some(size) => format!("{} ({size})", line.name),
                        None => line.name.clone(),
                    },
                    quantity: line.quantity,
                    total: money(line.line_total_minor()),
                    description: line.description.as_deref(),
                })
                .collect(),
            promo_code: order.promo_code.as_deref(),
            discount: money(order.discount_minor),
            shipping_method: &order.shipping_method,
            shipping_cost: money(order.shipping_cost_minor),
            total_paid: money(order.amount_total_minor),
            line1: &addr.line1,
            line2: addr.line2.as_deref(),
            city: &addr.city,
            region: &addr.state,
            postal_code: &addr.postal_code,
            country: addr.country.name(),
            order_id: &order.payment_session_id,
            payment_status: &order.payment_status,
        }
    }
}

pub(crate) fn render_error(e: askama::Error) -> DomainError {
    DomainError::Notification(format!("template: {e}"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::country::CountryCode;
    use crate::domain::money::CurrencyCode;
    use crate::domain::order::{DraftLineItem, PostalAddress, ShippingInfo};

    fn order() -> FinalizedOrder {
        FinalizedOrder {
            payment_session_id: "cs_test_9".to_string(),
            draft_id: Uuid::new_v4(),
            draft_created_at: Utc::now(),
            currency: CurrencyCode::Usd,
            shipping_info: ShippingInfo {
                name: "Ada <Lovelace>".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                address: PostalAddress {
                    line1: "1 Main St".to_string(),
                    line2: None,
                    city: "Springfield".to_string(),
                    state: "IL".to_string(),
                    postal_code: "62701".to_string(),
                    country: CountryCode::resolve("US").expect("US"),
                },
            },
            shipping_cost_minor: 900,
            shipping_method: "Tracked International".to_string(),
            line_items: vec![DraftLineItem {
                product_id: "personalized".to_string(),
                name: "Personalized".to_string(),
                size: Some("iPhone 15".to_string()),
                description: Some("cat & dog".to_string()),
                quantity: 1,
                unit_price_minor: 2599,
            }],
            promo_code: None,
            discount_minor: 0,
            total_minor: 3499,
            amount_total_minor: 3499,
            payment_status: "paid".to_string(),
            customer_email: None,
            paid_at: Utc::now(),
            finalized_at: Utc::now(),
        }
    }

    fn rendered(order: &FinalizedOrder) -> Notification {
        confirmation_email(order)
            .expect("templates render")
            .expect("address known")
    }

    #[test]
    fn subject_carries_session_id() {
        let mail = rendered(&order());
        assert_eq!(mail.subject, "Thanks for your order! (#cs_test_9)");
        assert_eq!(mail.to, "ada@example.com");
    }

    #[test]
    fn body_lists_items_total_and_escapes_input() {
        let body = rendered(&order()).html_body;
        assert!(body.contains("Personalized (iPhone 15)"));
        assert!(body.contains("34.99 USD"));
        assert!(body.contains("cat &amp; dog"));
        assert!(body.contains("Ada &lt;Lovelace&gt;"));
        assert!(!body.contains("<Lovelace>"));
        assert!(body.contains("Payment status: paid"));
        assert!(!body.contains("Promo"));
    }

    #[test]
    fn text_body_is_unescaped_and_shows_promo() {
        let mut order = order();
        order.promo_code = Some("WELCOME10".to_string());
        order.discount_minor = 260;
        order.shipping_info.address.line2 = Some("Apt 4".to_string());
        let mail = rendered(&order);
        assert!(mail.text_body.contains("Ada <Lovelace>"));
        assert!(mail.text_body.contains("\"cat & dog\""));
        assert!(mail.text_body.contains("Promo WELCOME10: -2.60 USD"));
        assert!(mail.text_body.contains("Apt 4"));
        assert!(mail.html_body.contains("<br>Apt 4"));
    }

    #[test]
    fn no_address_means_no_mail() {
        let mut order = order();
        order.shipping_info.email = String::new();
        assert!(confirmation_email(&order).expect("no render needed").is_none());
    }
}
