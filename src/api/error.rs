use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::batch::{BatchError, FieldError, ValidationErrors};
use crate::humanize::ByteSize;
use crate::storage::{CredentialError, StorageError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("signing failure: {0}")]
    SigningFailure(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("batch service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("batch service timed out: {0}")]
    UpstreamTimeout(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload exceeds the {0} limit")]
    PayloadTooLarge(ByteSize),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingCredentials(_) => StatusCode::FAILED_DEPENDENCY,
            ApiError::SigningFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::MissingCredentials(_) => "MISSING_CREDENTIALS",
            ApiError::SigningFailure(_) => "SIGNING_FAILURE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ApiError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ApiError::ValidationFailed(ValidationErrors::single(field, reason))
    }

    fn details(&self) -> Option<Vec<FieldError>> {
        match self {
            ApiError::ValidationFailed(errors) => Some(errors.0.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Upstream failures are already logged by the batch client
        if matches!(self, ApiError::SigningFailure(_) | ApiError::Internal(_)) {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

/// A body that does not decode is the caller's fault, not the remote's
impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::invalid("body", format!("is not valid JSON for this request: {value}"))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(value: ValidationErrors) -> Self {
        ApiError::ValidationFailed(value)
    }
}

impl From<CredentialError> for ApiError {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::Missing => ApiError::MissingCredentials(value.to_string()),
            CredentialError::Incomplete(field, _) => {
                ApiError::ValidationFailed(ValidationErrors::single(field, value.to_string()))
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        ApiError::SigningFailure(value.to_string())
    }
}

impl From<BatchError> for ApiError {
    fn from(value: BatchError) -> Self {
        match value {
            BatchError::NotFound(detail) => ApiError::NotFound(detail),
            BatchError::Conflict(detail) => ApiError::Conflict(detail),
            BatchError::BadRequest(detail) => ApiError::BadRequest(detail),
            BatchError::UpstreamUnavailable(detail) => ApiError::UpstreamUnavailable(detail),
            BatchError::UpstreamTimeout(detail) => ApiError::UpstreamTimeout(detail),
        }
    }
}
