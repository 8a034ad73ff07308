use actix_web::{web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::contact::ContactForm;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactResponse {
    pub success: bool,
}

/// POST /contact
///
/// Forwards a shopper's message to the store inbox.
#[utoipa::path(
    post,
    path = "/contact",
    request_body = ContactForm,
    responses(
        (status = 200, description = "Message forwarded", body = ContactResponse),
        (status = 422, description = "Missing fields, malformed email or message too long"),
        (status = 500, description = "Message could not be delivered"),
    ),
    tag = "contact"
)]
pub async fn send_message(
    state: web::Data<AppState>,
    body: web::Json<ContactForm>,
) -> Result<HttpResponse, AppError> {
    let form = body.into_inner();
    web::block(move || state.contact.send(&form)).await??;
    Ok(HttpResponse::Ok().json(ContactResponse { success: true }))
}
