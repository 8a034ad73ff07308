use actix_web::{web, HttpRequest, HttpResponse};

use crate::application::reconciler::ReconcileOutcome;
use crate::application::webhook::SIGNATURE_HEADER;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /webhooks/payment
///
/// Payment processor notifications. The raw body is needed for signature
/// verification, so it is not parsed by the extractor. Any non-2xx response
/// makes the processor redeliver.
#[utoipa::path(
    post,
    path = "/webhooks/payment",
    request_body(content = String, content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event handled, duplicate or ignored", body = ReconcileOutcome),
        (status = 400, description = "Bad signature, malformed payload or no draft id"),
        (status = 404, description = "Referenced draft not found"),
        (status = 500, description = "Storage failure"),
    ),
    tag = "webhooks"
)]
pub async fn payment_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = web::block(move || state.reconciler.handle(&body, signature.as_deref()))
        .await??;

    Ok(HttpResponse::Ok().json(outcome))
}
