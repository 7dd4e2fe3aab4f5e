//! Error handling module
//!
//! Centralized error types, the stable error-kind taxonomy, and HTTP
//! response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::ledger::LedgerStoreError;
use crate::reference::CacheError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Stable error kinds every failure is reduced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    Unauthorized,
    NotFound,
    PreconditionFailed,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Internal => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PreconditionFailed => StatusCode::CONFLICT,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    // Server errors (5xx)
    #[error("Storage error: {0}")]
    Storage(#[from] LedgerStoreError),
}

impl AppError {
    /// Reduce this error to its stable kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::Domain(err) => match err {
                DomainError::Unauthenticated => ErrorKind::Unauthenticated,
                DomainError::ItemNotFound(_) | DomainError::RentalNotFound(_) => {
                    ErrorKind::NotFound
                }
                DomainError::NotRentalParty { .. } => ErrorKind::Unauthorized,
                DomainError::InvalidPeriod(_) | DomainError::InvalidAmount(_) => {
                    ErrorKind::InvalidArgument
                }
                err if err.is_precondition_failure() => ErrorKind::PreconditionFailed,
                _ => ErrorKind::Internal,
            },
            AppError::Cache(err) => match err {
                CacheError::InvalidArgument(_) => ErrorKind::InvalidArgument,
                CacheError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            },
            AppError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        let details = match &self {
            AppError::InvalidArgument(msg) => Some(msg.clone()),
            AppError::Domain(err) => Some(err.to_string()),
            AppError::Cache(err) => Some(err.to_string()),

            // Internal details stay in the logs
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                None
            }
        };

        let error = if kind == ErrorKind::Internal {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: kind.as_str().to_string(),
            details,
        };

        (kind.status_code(), Json(body)).into_response()
    }
}
