use thiserror::Error;

/// Shopper-fixable input problems. The code is what the storefront renders
/// next to the offending field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing_fields")]
    MissingFields,
    #[error("invalid_country")]
    InvalidCountry,
    #[error("duplicate_promo")]
    DuplicatePromo,
    #[error("unknown_promo")]
    UnknownPromo,
    #[error("empty_cart")]
    EmptyCart,
    #[error("invalid_quantity")]
    InvalidQuantity,
    #[error("description_too_long")]
    DescriptionTooLong,
    #[error("unknown_product")]
    UnknownProduct,
    #[error("unknown_currency")]
    UnknownCurrency,
    #[error("invalid_email")]
    InvalidEmail,
    #[error("message_too_long")]
    MessageTooLong,
}

impl ValidationError {
    pub fn code(self) -> &'static str {
        match self {
            ValidationError::MissingFields => "missing_fields",
            ValidationError::InvalidCountry => "invalid_country",
            ValidationError::DuplicatePromo => "duplicate_promo",
            ValidationError::UnknownPromo => "unknown_promo",
            ValidationError::EmptyCart => "empty_cart",
            ValidationError::InvalidQuantity => "invalid_quantity",
            ValidationError::DescriptionTooLong => "description_too_long",
            ValidationError::UnknownProduct => "unknown_product",
            ValidationError::UnknownCurrency => "unknown_currency",
            ValidationError::InvalidEmail => "invalid_email",
            ValidationError::MessageTooLong => "message_too_long",
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found")]
    NotFound,
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Payment provider error: {0}")]
    Provider(String),
    #[error("Reconciliation inconsistency: {0}")]
    ReconciliationInconsistency(String),
    #[error("Payment event carries no draft id")]
    MissingCorrelation,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Notification failure: {0}")]
    Notification(String),
}
