//! Hosted checkout sessions on the card processor's REST API.

use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::errors::DomainError;
use crate::domain::payment::{PaymentLineItem, PaymentSession, PaymentSessionRequest};
use crate::domain::ports::PaymentGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct StripePaymentGateway {
    client: Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripePaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripePaymentGateway")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripePaymentGateway {
    /// Builds a blocking client, so this must run outside an async runtime.
    pub fn new(api_base: &str, secret_key: SecretString) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DomainError::Provider(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }
}

impl PaymentGateway for StripePaymentGateway {
    fn create_session(&self, request: &PaymentSessionRequest) -> Result<PaymentSession, DomainError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&session_form(request))
            .send()
            .map_err(|e| DomainError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .ok()
                .and_then(|r| r.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(DomainError::Provider(message));
        }

        let session: SessionResponse = response
            .json()
            .map_err(|e| DomainError::Provider(e.to_string()))?;
        let redirect_url = session
            .url
            .ok_or_else(|| DomainError::Provider(format!("session {} has no url", session.id)))?;
        Ok(PaymentSession {
            session_id: session.id,
            redirect_url,
        })
    }
}

/// Flattens the request into the processor's bracketed form encoding.
fn session_form(request: &PaymentSessionRequest) -> Vec<(String, String)> {
    let currency = request.currency.as_str().to_ascii_lowercase();
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    let lines = request
        .line_items
        .iter()
        .chain(std::iter::once(&request.shipping_line));
    for (i, line) in lines.enumerate() {
        push_line(&mut form, i, line, &currency);
    }

    for (key, value) in &request.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    form
}

fn push_line(form: &mut Vec<(String, String)>, index: usize, line: &PaymentLineItem, currency: &str) {
    let prefix = format!("line_items[{index}]");
    form.push((format!("{prefix}[price_data][currency]"), currency.to_string()));
    form.push((
        format!("{prefix}[price_data][product_data][name]"),
        line.name.clone(),
    ));
    if let Some(image) = &line.image_url {
        form.push((
            format!("{prefix}[price_data][product_data][images][0]"),
            image.clone(),
        ));
    }
    form.push((
        format!("{prefix}[price_data][unit_amount]"),
        line.unit_amount_minor.to_string(),
    ));
    form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::money::CurrencyCode;

    fn request() -> PaymentSessionRequest {
        let mut metadata = BTreeMap::new();
        metadata.insert("draft_id".to_string(), "d-1".to_string());
        PaymentSessionRequest {
            currency: CurrencyCode::Usd,
            line_items: vec![PaymentLineItem {
                name: "Personalized".to_string(),
                image_url: Some("https://cases.example/images/example-0.png".to_string()),
                unit_amount_minor: 2599,
                quantity: 1,
            }],
            shipping_line: PaymentLineItem {
                name: "Tracked International".to_string(),
                image_url: None,
                unit_amount_minor: 900,
                quantity: 1,
            },
            customer_email: "ada@example.com".to_string(),
            metadata,
            success_url: "https://cases.example/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://cases.example/".to_string(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn shipping_is_sent_as_its_own_line() {
        let form = session_form(&request());
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("2599"));
        assert_eq!(
            value(&form, "line_items[1][price_data][product_data][name]"),
            Some("Tracked International")
        );
        assert_eq!(value(&form, "line_items[1][price_data][unit_amount]"), Some("900"));
        assert_eq!(value(&form, "line_items[1][price_data][product_data][images][0]"), None);
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("usd"));
    }

    #[test]
    fn metadata_and_urls_are_forwarded() {
        let form = session_form(&request());
        assert_eq!(value(&form, "metadata[draft_id]"), Some("d-1"));
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "customer_email"), Some("ada@example.com"));
        assert_eq!(value(&form, "cancel_url"), Some("https://cases.example/"));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let gateway = StripePaymentGateway::new(
            "https://api.stripe.com/",
            SecretString::from("sk_test_secret".to_string()),
        )
        .expect("client builds");
        let debug = format!("{gateway:?}");
        assert!(!debug.contains("sk_test_secret"));
        assert!(debug.contains("https://api.stripe.com\""));
    }
}
