//! Error type shared by every Domus crate
//!
//! Storage, upstream and business failures all end up as an `AppError`,
//! which renders itself as a JSON body `{error, message, status}`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Application error
#[derive(Error, Debug)]
pub enum AppError {
    /// Query or driver failure in PostgreSQL
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Failure of the local JSON-file store
    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("HICP value not found for {0}")]
    HicpNotFound(String),

    #[error("Unknown exchange rate source: {0}")]
    UnknownRateSource(String),

    /// Every rate tier failed, including the configured default
    #[error("Exchange rate unavailable for {0}")]
    RateUnavailable(String),

    /// The contract does not cover the requested month
    #[error("Nothing to invoice: {0}")]
    NothingToInvoice(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Request that could not be parsed at all
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::UnknownRateSource(_) => StatusCode::BAD_REQUEST,

            AppError::ContractNotFound(_)
            | AppError::InvoiceNotFound(_)
            | AppError::HicpNotFound(_) => StatusCode::NOT_FOUND,

            AppError::Conflict(_) | AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            AppError::NothingToInvoice(_) => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::RateUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Transaction(_)
            | AppError::Storage(_)
            | AppError::Cache(_)
            | AppError::CacheConnection(_)
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable snake_case code for API clients
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Storage(_) => "storage_error",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::ContractNotFound(_) => "contract_not_found",
            AppError::InvoiceNotFound(_) => "invoice_not_found",
            AppError::HicpNotFound(_) => "hicp_not_found",
            AppError::UnknownRateSource(_) => "unknown_rate_source",
            AppError::RateUnavailable(_) => "rate_unavailable",
            AppError::NothingToInvoice(_) => "nothing_to_invoice",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::ContractNotFound("42".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UnknownRateSource("ecb".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NothingToInvoice("contract 7".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Storage("disk full".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::HicpNotFound("2024-03".to_string()).error_code(),
            "hicp_not_found"
        );
        assert_eq!(
            AppError::RateUnavailable("bnr".to_string()).error_code(),
            "rate_unavailable"
        );
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.error_code(), "storage_error");
    }
}
