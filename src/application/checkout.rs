use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::catalog::Catalog;
use crate::domain::country::CountryCode;
use crate::domain::errors::{DomainError, ValidationError};
use crate::domain::money::CurrencyCode;
use crate::domain::order::{DraftLineItem, OrderDraft, PostalAddress, ShippingInfo};
use crate::domain::payment::{PaymentLineItem, PaymentSessionRequest};
use crate::domain::ports::{OrderStore, PaymentGateway};
use crate::domain::pricing::{discount_minor, PricingEngine, PromoTable};
use crate::domain::shipping::{ShippingMethod, ShippingResolver};

/// Delivery form as submitted by the storefront.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliveryForm {
    pub country: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: String,
    /// Apartment, suite, unit; becomes address line 2.
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl DeliveryForm {
    fn require_fields(&self) -> Result<(), ValidationError> {
        let required = [
            &self.country,
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.address,
            &self.city,
            &self.state,
            &self.postal_code,
        ];
        if required.iter().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::MissingFields);
        }
        Ok(())
    }

    fn shipping_info(&self, country: CountryCode) -> ShippingInfo {
        let optional = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        ShippingInfo {
            name: format!("{} {}", self.first_name.trim(), self.last_name.trim()),
            email: self.email.trim().to_string(),
            phone: optional(&self.phone),
            address: PostalAddress {
                line1: self.address.trim().to_string(),
                line2: optional(&self.apartment),
                city: self.city.trim().to_string(),
                state: self.state.trim().to_string(),
                postal_code: self.postal_code.trim().to_string(),
                country,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShippingOptionView {
    pub name: String,
    pub tracked: bool,
    pub cost_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CheckoutQuote {
    pub currency: CurrencyCode,
    pub items_total_minor: i64,
    pub promo_code: Option<String>,
    pub discount_minor: i64,
    pub shipping_options: Vec<ShippingOptionView>,
    pub shipping_method: String,
    pub shipping_cost_minor: i64,
    pub grand_total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CheckoutRedirect {
    pub draft_id: Uuid,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub base_url: String,
}

impl CheckoutUrls {
    fn success(&self) -> String {
        format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", self.base())
    }

    fn cancel(&self) -> String {
        format!("{}/", self.base())
    }

    fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base(), path.trim_start_matches('/'))
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Pricing collaborators shared by the quote and the submission path.
#[derive(Debug, Clone)]
pub struct Storefront {
    pub catalog: Arc<Catalog>,
    pub pricing: Arc<PricingEngine>,
    pub shipping: Arc<ShippingResolver>,
    pub promos: Arc<PromoTable>,
}

impl Storefront {
    /// Totals for a cart shipped to `destination`. The discount is taken off
    /// the converted item subtotal and clamped to it, so the grand total is
    /// never below the shipping cost.
    pub fn quote(
        &self,
        cart: &Cart,
        destination: CountryCode,
        shipping_selection: Option<&str>,
        currency: CurrencyCode,
        promo_code: Option<&str>,
    ) -> Result<CheckoutQuote, ValidationError> {
        let promo = promo_code
            .map(|code| self.promos.lookup(code))
            .transpose()?;

        let items_total_minor: i64 = cart
            .items
            .iter()
            .map(|i| {
                self.pricing
                    .line_total(i.unit_price_minor, i.quantity, currency)
                    .amount_minor
            })
            .sum();
        let discount = promo
            .as_ref()
            .map_or(0, |(_, pct)| discount_minor(items_total_minor, *pct));

        let options = self.shipping.resolve(destination, cart);
        let selected = options.select(shipping_selection);
        let shipping_cost_minor = self.shipping_cost(selected, currency);

        Ok(CheckoutQuote {
            currency,
            items_total_minor,
            promo_code: promo.map(|(code, _)| code),
            discount_minor: discount,
            shipping_options: options
                .methods()
                .iter()
                .map(|m| ShippingOptionView {
                    name: m.name.clone(),
                    tracked: m.tracked,
                    cost_minor: self.shipping_cost(m, currency),
                })
                .collect(),
            shipping_method: selected.name.clone(),
            shipping_cost_minor,
            grand_total_minor: items_total_minor - discount + shipping_cost_minor,
        })
    }

    fn shipping_cost(&self, method: &ShippingMethod, currency: CurrencyCode) -> i64 {
        self.pricing
            .convert_shipping(method.base_cost_minor, currency)
            .amount_minor
    }
}

/// Validates delivery details, freezes the cart into a draft and opens a
/// payment session that carries the draft id.
pub struct CheckoutService<S, G> {
    store: S,
    gateway: G,
    storefront: Storefront,
    urls: CheckoutUrls,
}

impl<S: OrderStore, G: PaymentGateway> CheckoutService<S, G> {
    pub fn new(store: S, gateway: G, storefront: Storefront, urls: CheckoutUrls) -> Self {
        Self {
            store,
            gateway,
            storefront,
            urls,
        }
    }

    pub fn storefront(&self) -> &Storefront {
        &self.storefront
    }

    /// Every call produces a fresh draft; resubmitting after a provider
    /// failure leaves the earlier draft orphaned, which is harmless.
    pub fn submit(
        &self,
        form: &DeliveryForm,
        cart: &Cart,
        shipping_selection: Option<&str>,
        currency: CurrencyCode,
        promo_code: Option<&str>,
    ) -> Result<CheckoutRedirect, DomainError> {
        form.require_fields()?;
        let country = CountryCode::resolve(&form.country)?;
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let quote = self
            .storefront
            .quote(cart, country, shipping_selection, currency, promo_code)?;
        let line_items = self.draft_lines(cart, currency)?;

        let draft = OrderDraft {
            draft_id: Uuid::new_v4(),
            created_at: Utc::now(),
            currency,
            shipping_info: form.shipping_info(country),
            shipping_cost_minor: quote.shipping_cost_minor,
            shipping_method: quote.shipping_method.clone(),
            line_items,
            promo_code: quote.promo_code.clone(),
            discount_minor: quote.discount_minor,
            total_minor: quote.grand_total_minor,
        };

        // No payment session may exist without a retrievable draft.
        self.store.create_draft(&draft)?;
        log::info!(
            "Created order draft {} ({} {})",
            draft.draft_id,
            draft.total_minor,
            draft.currency
        );

        let request = self.payment_request(&draft);
        let session = self.gateway.create_session(&request).map_err(|e| {
            log::error!("Payment session for draft {} failed: {e}", draft.draft_id);
            match e {
                DomainError::Provider(msg) => DomainError::Provider(msg),
                other => DomainError::Provider(other.to_string()),
            }
        })?;
        log::info!(
            "Opened payment session {} for draft {}",
            session.session_id,
            draft.draft_id
        );

        Ok(CheckoutRedirect {
            draft_id: draft.draft_id,
            redirect_url: session.redirect_url,
        })
    }

    fn draft_lines(&self, cart: &Cart, currency: CurrencyCode) -> Result<Vec<DraftLineItem>, ValidationError> {
        cart.items
            .iter()
            .map(|item| {
                let product = self.storefront.catalog.get(&item.product_id)?;
                Ok(DraftLineItem {
                    product_id: item.product_id.clone(),
                    name: product.name.clone(),
                    size: item.size.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price_minor: self
                        .storefront
                        .pricing
                        .convert(item.unit_price_minor, currency)
                        .amount_minor,
                })
            })
            .collect()
    }

    /// The processor rejects negative lines, so a discounted cart is sent as
    /// one collapsed items line whose amount already has the discount taken
    /// off. Either way the session total equals the draft total.
    fn payment_request(&self, draft: &OrderDraft) -> PaymentSessionRequest {
        let line_items = match (&draft.promo_code, draft.discount_minor) {
            (Some(code), discount) if discount > 0 => {
                let items_total: i64 = draft.line_items.iter().map(DraftLineItem::line_total_minor).sum();
                vec![PaymentLineItem {
                    name: format!("Items (promo {code})"),
                    image_url: None,
                    unit_amount_minor: items_total - discount,
                    quantity: 1,
                }]
            }
            _ => draft
                .line_items
                .iter()
                .map(|line| PaymentLineItem {
                    name: line.name.clone(),
                    image_url: self
                        .storefront
                        .catalog
                        .get(&line.product_id)
                        .ok()
                        .and_then(|p| p.primary_image())
                        .map(|img| self.urls.absolute(img)),
                    unit_amount_minor: line.unit_price_minor,
                    quantity: line.quantity,
                })
                .collect(),
        };

        let info = &draft.shipping_info;
        let mut metadata = BTreeMap::new();
        metadata.insert("draft_id".to_string(), draft.draft_id.to_string());
        metadata.insert("shipping_name".to_string(), info.name.clone());
        metadata.insert(
            "shipping_phone".to_string(),
            info.phone.clone().unwrap_or_default(),
        );
        metadata.insert(
            "shipping_address_line1".to_string(),
            info.address.line1.clone(),
        );
        metadata.insert(
            "shipping_address_line2".to_string(),
            info.address.line2.clone().unwrap_or_default(),
        );
        metadata.insert("shipping_city".to_string(), info.address.city.clone());
        metadata.insert("shipping_state".to_string(), info.address.state.clone());
        metadata.insert(
            "shipping_postal_code".to_string(),
            info.address.postal_code.clone(),
        );
        metadata.insert(
            "shipping_country".to_string(),
            info.address.country.to_string(),
        );

        PaymentSessionRequest {
            currency: draft.currency,
            line_items,
            shipping_line: PaymentLineItem {
                name: draft.shipping_method.clone(),
                image_url: None,
                unit_amount_minor: draft.shipping_cost_minor,
                quantity: 1,
            },
            customer_email: info.email.clone(),
            metadata,
            success_url: self.urls.success(),
            cancel_url: self.urls.cancel(),
        }
    }
}
