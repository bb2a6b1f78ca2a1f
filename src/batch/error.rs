use reqwest::StatusCode;
use thiserror::Error;

/// Longest remote error body carried into local errors
const MAX_DETAIL_CHARS: usize = 512;

/// Failures of a remote batch operation, classified from the response
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("batch service rejected request: {0}")]
    BadRequest(String),

    #[error("batch service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("batch service timed out: {0}")]
    UpstreamTimeout(String),
}

impl BatchError {
    /// Classify a non-success remote status
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = truncate_detail(body, status);
        match status {
            StatusCode::NOT_FOUND => BatchError::NotFound(detail),
            StatusCode::CONFLICT => BatchError::Conflict(detail),
            StatusCode::GATEWAY_TIMEOUT => BatchError::UpstreamTimeout(detail),
            s if s.is_client_error() => BatchError::BadRequest(detail),
            _ => BatchError::UpstreamUnavailable(detail),
        }
    }

    /// Classify a transport-level failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            BatchError::UpstreamTimeout(err.to_string())
        } else {
            BatchError::UpstreamUnavailable(err.to_string())
        }
    }
}

fn truncate_detail(body: &str, status: StatusCode) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
    }
    if body.chars().count() <= MAX_DETAIL_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{truncated}...")
}
