use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use super::carts::check_device_token;
use super::products::parse_currency;
use crate::application::checkout::{CheckoutRedirect, DeliveryForm};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub delivery: DeliveryForm,
    /// Display currency; defaults to `CAD`.
    pub currency: Option<String>,
    /// Name of the selected shipping tier.
    pub shipping_method: Option<String>,
}

/// POST /carts/{token}/checkout
///
/// Freezes the cart into an order draft and opens a hosted payment page.
/// The cart itself is left untouched.
#[utoipa::path(
    post,
    path = "/carts/{token}/checkout",
    params(("token" = String, Path, description = "Device token")),
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Draft created; redirect the shopper", body = CheckoutRedirect),
        (status = 422, description = "Missing fields, unknown country, empty cart or unknown promo"),
        (status = 502, description = "Payment provider unavailable"),
    ),
    tag = "checkout"
)]
pub async fn submit_checkout(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let token = path.into_inner();
    check_device_token(&token)?;
    let body = body.into_inner();
    let currency = parse_currency(body.currency.as_deref())?;

    let redirect = web::block(move || {
        let cart = state.sessions.with_bridge(&token, |bridge| bridge.cart());
        state.checkout.submit(
            &body.delivery,
            &cart,
            body.shipping_method.as_deref(),
            currency,
            cart.promo_code.as_deref(),
        )
    })
    .await??;

    Ok(HttpResponse::Created().json(redirect))
}
