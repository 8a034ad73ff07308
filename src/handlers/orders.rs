use actix_web::{web, HttpResponse};

use crate::domain::order::FinalizedOrder;
use crate::errors::AppError;
use crate::state::AppState;

/// GET /orders/{session_id}
///
/// Finalized order for the payment success page.
#[utoipa::path(
    get,
    path = "/orders/{session_id}",
    params(
        ("session_id" = String, Path, description = "Payment processor session id"),
    ),
    responses(
        (status = 200, description = "Order found", body = FinalizedOrder),
        (status = 404, description = "Order not found (payment may still be settling)"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();

    let order = web::block(move || state.reconciler.find_order(&session_id)).await??;

    Ok(HttpResponse::Ok().json(order))
}
