use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::{DomainError, ValidationError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payment event refers to state this service does not have (yet).
    #[error("Unknown order state: {0}")]
    Inconsistent(String),

    #[error("Payment provider error: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::Validation(v) => AppError::Validation(v),
            DomainError::MissingCorrelation => AppError::BadRequest(e.to_string()),
            DomainError::InvalidSignature(msg) | DomainError::InvalidPayload(msg) => {
                AppError::BadRequest(msg)
            }
            DomainError::ReconciliationInconsistency(msg) => AppError::Inconsistent(msg),
            DomainError::Provider(msg) => AppError::BadGateway(msg),
            DomainError::Persistence(msg) | DomainError::Notification(msg) => {
                AppError::Internal(msg)
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e)
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound | AppError::Inconsistent(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Validation(v) => v.code().to_string(),
            AppError::BadGateway(_) => "Payment provider unavailable".to_string(),
            AppError::Internal(msg) => {
                log::error!("Request failed: {msg}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_display() {
        assert_eq!(AppError::NotFound.to_string(), "Not found");
    }

    #[test]
    fn internal_error_display() {
        assert_eq!(
            AppError::Internal("msg".to_string()).to_string(),
            "Internal error: msg"
        );
    }

    #[actix_web::test]
    async fn validation_body_is_the_error_code() {
        let resp = AppError::from(DomainError::Validation(ValidationError::DuplicatePromo))
            .error_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = to_bytes(resp.into_body()).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["error"], "duplicate_promo");
    }

    #[actix_web::test]
    async fn provider_details_are_not_leaked() {
        let resp = AppError::from(DomainError::Provider("sk_live_... rejected".to_string()))
            .error_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(resp.into_body()).await.expect("body");
        assert!(!String::from_utf8_lossy(&body).contains("sk_live"));
    }

    #[test]
    fn webhook_failures_are_non_2xx() {
        let cases = [
            (DomainError::InvalidSignature("x".to_string()), StatusCode::BAD_REQUEST),
            (DomainError::InvalidPayload("x".to_string()), StatusCode::BAD_REQUEST),
            (DomainError::MissingCorrelation, StatusCode::BAD_REQUEST),
            (
                DomainError::ReconciliationInconsistency("x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::Persistence("x".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (domain, status) in cases {
            assert_eq!(AppError::from(domain).status_code(), status);
        }
    }

    #[test]
    fn domain_not_found_maps_to_app_not_found() {
        let app_err: AppError = DomainError::NotFound.into();
        assert!(matches!(app_err, AppError::NotFound));
    }
}
