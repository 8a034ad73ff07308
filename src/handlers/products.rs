use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::money::CurrencyCode;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CurrencyQuery {
    /// ISO currency code, e.g. `USD`. Defaults to `CAD`.
    pub currency: Option<String>,
}

impl CurrencyQuery {
    pub fn resolve(&self) -> Result<CurrencyCode, AppError> {
        parse_currency(self.currency.as_deref())
    }
}

pub fn parse_currency(raw: Option<&str>) -> Result<CurrencyCode, AppError> {
    match raw.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Ok(code.parse()?),
        None => Ok(CurrencyCode::Cad),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_minor: i64,
    pub currency: CurrencyCode,
    pub images: Vec<String>,
}

/// GET /products
///
/// The catalog with prices in the requested display currency.
#[utoipa::path(
    get,
    path = "/products",
    params(CurrencyQuery),
    responses(
        (status = 200, description = "Catalog", body = [ProductResponse]),
        (status = 422, description = "Unknown currency"),
    ),
    tag = "catalog"
)]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let currency = query.resolve()?;
    let storefront = state.storefront();

    let products: Vec<ProductResponse> = storefront
        .catalog
        .products()
        .iter()
        .map(|p| ProductResponse {
            id: p.id.clone(),
            name: p.name.clone(),
            price_minor: storefront
                .pricing
                .convert(p.base_price_minor, currency)
                .amount_minor,
            currency,
            images: p.images.clone(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(products))
}
