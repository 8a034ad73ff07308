use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::products::{parse_currency, CurrencyQuery};
use crate::application::cart_sync::SyncState;
use crate::application::checkout::{CheckoutQuote, ShippingOptionView, Storefront};
use crate::domain::cart::{CartIdentity, CartItemUpdate, LineKey};
use crate::domain::country::CountryCode;
use crate::domain::money::CurrencyCode;
use crate::errors::AppError;
use crate::state::{AppState, Bridge};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub size: Option<String>,
    /// Personalization brief; makes the entry a personalized item.
    pub description: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub key: LineKey,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFieldsRequest {
    pub key: LineKey,
    pub update: CartItemUpdate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveItemRequest {
    pub key: LineKey,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PromoRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub account_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ShippingQuery {
    /// Destination country, ISO code or name.
    pub country: String,
    pub currency: Option<String>,
    /// Previously selected tier; kept when still offered.
    pub selected: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct QuoteQuery {
    pub country: String,
    pub currency: Option<String>,
    pub shipping: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub product_id: String,
    pub size: Option<String>,
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub state: SyncState,
    pub account_id: Option<String>,
    pub currency: CurrencyCode,
    pub items: Vec<CartLineResponse>,
    pub promo_code: Option<String>,
    pub total_quantity: u32,
    pub items_total_minor: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShippingResponse {
    pub options: Vec<ShippingOptionView>,
    pub selected: String,
    pub cost_minor: i64,
}

impl CartResponse {
    fn build(bridge: &Bridge, storefront: &Storefront, currency: CurrencyCode) -> Self {
        let cart = bridge.cart();
        let items: Vec<CartLineResponse> = cart
            .items
            .iter()
            .map(|i| CartLineResponse {
                product_id: i.product_id.clone(),
                size: i.size.clone(),
                description: i.description.clone(),
                quantity: i.quantity,
                unit_price_minor: storefront
                    .pricing
                    .convert(i.unit_price_minor, currency)
                    .amount_minor,
                line_total_minor: storefront
                    .pricing
                    .line_total(i.unit_price_minor, i.quantity, currency)
                    .amount_minor,
            })
            .collect();
        Self {
            state: bridge.state(),
            account_id: bridge.account_id().map(str::to_string),
            currency,
            items_total_minor: items.iter().map(|l| l.line_total_minor).sum(),
            items,
            promo_code: cart.promo_code.clone(),
            total_quantity: cart.total_quantity(),
        }
    }
}

fn normalized(key: &LineKey) -> LineKey {
    LineKey::new(&key.product_id, key.size.as_deref(), key.description.as_deref())
}

/// Runs `f` on the device's bridge on the blocking pool; opening a bridge
/// reads the durable cart.
async fn on_bridge<T, F>(state: web::Data<AppState>, token: String, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&mut Bridge, &AppState) -> Result<T, AppError> + Send + 'static,
{
    check_device_token(&token)?;
    web::block(move || {
        let state = state.get_ref();
        state.sessions.with_bridge(&token, |bridge| f(bridge, state))
    })
    .await?
}

/// Rejects tokens whose cart record could never be stored.
pub(super) fn check_device_token(token: &str) -> Result<(), AppError> {
    if CartIdentity::Device(token.to_string()).fits_storage() {
        Ok(())
    } else {
        Err(AppError::BadRequest("device token is too long".to_string()))
    }
}

async fn respond_with_cart<F>(
    state: web::Data<AppState>,
    token: String,
    currency: CurrencyCode,
    f: F,
) -> Result<HttpResponse, AppError>
where
    F: FnOnce(&mut Bridge, &AppState) -> Result<(), AppError> + Send + 'static,
{
    let cart = on_bridge(state, token, move |bridge, state| {
        f(bridge, state)?;
        Ok(CartResponse::build(bridge, state.storefront(), currency))
    })
    .await?;
    Ok(HttpResponse::Ok().json(cart))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /carts/{token}
#[utoipa::path(
    get,
    path = "/carts/{token}",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    responses((status = 200, description = "Current cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn get_cart(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    respond_with_cart(state, path.into_inner(), currency, |_, _| Ok(())).await
}

/// POST /carts/{token}/items
#[utoipa::path(
    post,
    path = "/carts/{token}/items",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 422, description = "Unknown product, zero quantity or brief too long"),
    ),
    tag = "carts"
)]
pub async fn add_item(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
    body: web::Json<AddItemRequest>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let body = body.into_inner();
    respond_with_cart(state, path.into_inner(), currency, move |bridge, state| {
        let product = state.storefront().catalog.get(&body.product_id)?;
        bridge.add(
            product,
            body.quantity,
            body.size.as_deref(),
            body.description.as_deref(),
        )?;
        Ok(())
    })
    .await
}

/// PATCH /carts/{token}/items
///
/// A quantity below 1 is ignored; use DELETE to remove an entry.
#[utoipa::path(
    patch,
    path = "/carts/{token}/items",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    request_body = UpdateQuantityRequest,
    responses((status = 200, description = "Updated cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn update_quantity(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
    body: web::Json<UpdateQuantityRequest>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let body = body.into_inner();
    respond_with_cart(state, path.into_inner(), currency, move |bridge, _| {
        bridge.update_quantity(&normalized(&body.key), body.quantity);
        Ok(())
    })
    .await
}

/// PUT /carts/{token}/items
#[utoipa::path(
    put,
    path = "/carts/{token}/items",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    request_body = UpdateFieldsRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 422, description = "Invalid quantity or brief too long"),
    ),
    tag = "carts"
)]
pub async fn update_fields(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
    body: web::Json<UpdateFieldsRequest>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let body = body.into_inner();
    respond_with_cart(state, path.into_inner(), currency, move |bridge, _| {
        bridge.update_fields(&normalized(&body.key), &body.update)?;
        Ok(())
    })
    .await
}

/// DELETE /carts/{token}/items
#[utoipa::path(
    delete,
    path = "/carts/{token}/items",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    request_body = RemoveItemRequest,
    responses((status = 200, description = "Updated cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn remove_item(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
    body: web::Json<RemoveItemRequest>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let key = normalized(&body.key);
    respond_with_cart(state, path.into_inner(), currency, move |bridge, _| {
        bridge.remove(&key);
        Ok(())
    })
    .await
}

/// DELETE /carts/{token}
#[utoipa::path(
    delete,
    path = "/carts/{token}",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    responses((status = 200, description = "Emptied cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn clear_cart(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    respond_with_cart(state, path.into_inner(), currency, |bridge, _| {
        bridge.clear();
        Ok(())
    })
    .await
}

/// POST /carts/{token}/promo
#[utoipa::path(
    post,
    path = "/carts/{token}/promo",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    request_body = PromoRequest,
    responses(
        (status = 200, description = "Promo applied", body = CartResponse),
        (status = 422, description = "Unknown code, or a code is already active"),
    ),
    tag = "carts"
)]
pub async fn apply_promo(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
    body: web::Json<PromoRequest>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let code = body.into_inner().code;
    respond_with_cart(state, path.into_inner(), currency, move |bridge, state| {
        bridge.apply_promo(&code, &state.storefront().promos)?;
        Ok(())
    })
    .await
}

/// DELETE /carts/{token}/promo
#[utoipa::path(
    delete,
    path = "/carts/{token}/promo",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    responses((status = 200, description = "Promo removed", body = CartResponse)),
    tag = "carts"
)]
pub async fn remove_promo(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    respond_with_cart(state, path.into_inner(), currency, |bridge, _| {
        bridge.remove_promo();
        Ok(())
    })
    .await
}

/// POST /carts/{token}/sign-in
///
/// Merges the device cart into the account's stored cart.
#[utoipa::path(
    post,
    path = "/carts/{token}/sign-in",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Merged cart", body = CartResponse),
        (status = 400, description = "Blank or over-long account id"),
    ),
    tag = "carts"
)]
pub async fn sign_in(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
    body: web::Json<SignInRequest>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let account_id = body.into_inner().account_id.trim().to_string();
    if account_id.is_empty() {
        return Err(AppError::BadRequest("account_id is required".to_string()));
    }
    if !CartIdentity::Account(account_id.clone()).fits_storage() {
        return Err(AppError::BadRequest("account_id is too long".to_string()));
    }
    respond_with_cart(state, path.into_inner(), currency, move |bridge, _| {
        bridge.sign_in(&account_id);
        Ok(())
    })
    .await
}

/// POST /carts/{token}/sign-out
///
/// The cart is cleared, not copied back to the device.
#[utoipa::path(
    post,
    path = "/carts/{token}/sign-out",
    params(("token" = String, Path, description = "Device token"), CurrencyQuery),
    responses((status = 200, description = "Empty anonymous cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn sign_out(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    respond_with_cart(state, path.into_inner(), currency, |bridge, _| {
        bridge.sign_out();
        Ok(())
    })
    .await
}

async fn quote_cart(
    state: web::Data<AppState>,
    token: String,
    country: &str,
    currency: Option<&str>,
    shipping: Option<String>,
) -> Result<CheckoutQuote, AppError> {
    let destination = CountryCode::resolve(country)?;
    let currency = parse_currency(currency)?;
    on_bridge(state, token, move |bridge, state| {
        let cart = bridge.cart();
        Ok(state.storefront().quote(
            &cart,
            destination,
            shipping.as_deref(),
            currency,
            cart.promo_code.as_deref(),
        )?)
    })
    .await
}

/// GET /carts/{token}/shipping
///
/// Tiers offered for the destination, with display costs.
#[utoipa::path(
    get,
    path = "/carts/{token}/shipping",
    params(("token" = String, Path, description = "Device token"), ShippingQuery),
    responses(
        (status = 200, description = "Shipping options", body = ShippingResponse),
        (status = 422, description = "Unknown country or currency"),
    ),
    tag = "checkout"
)]
pub async fn shipping_options(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ShippingQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let quote = quote_cart(
        state,
        path.into_inner(),
        &query.country,
        query.currency.as_deref(),
        query.selected,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ShippingResponse {
        options: quote.shipping_options,
        selected: quote.shipping_method,
        cost_minor: quote.shipping_cost_minor,
    }))
}

/// GET /carts/{token}/quote
#[utoipa::path(
    get,
    path = "/carts/{token}/quote",
    params(("token" = String, Path, description = "Device token"), QuoteQuery),
    responses(
        (status = 200, description = "Order totals", body = CheckoutQuote),
        (status = 422, description = "Unknown country, currency or promo"),
    ),
    tag = "checkout"
)]
pub async fn quote(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<QuoteQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let quote = quote_cart(
        state,
        path.into_inner(),
        &query.country,
        query.currency.as_deref(),
        query.shipping,
    )
    .await?;
    Ok(HttpResponse::Ok().json(quote))
}
