//! Request and response bodies of the `/api` surface.
//!
//! Batch resources are passed through in the remote's own shape
//! ([`crate::batch::BatchJob`]); only the presign endpoints and errors
//! have bodies of their own, in camelCase as the UI expects.
//!
//! Single presigned URL request:
//!
//! ```json
//! {
//!   "bucket": "modular-batch-api-batches",
//!   "key": "inputs/batch-001.tar",
//!   "operation": "put",
//!   "expiry": 3600,
//!   "credentials": { "accessKeyId": "AKID...", "secretAccessKey": "..." }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{FieldError, ValidationErrors};
use crate::storage::{ExplicitCredentials, Operation};

#[derive(Debug, Default, Deserialize)]
pub struct PresignRequest {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    /// Lifetime in seconds
    #[serde(default, alias = "expiresIn", alias = "expires_in")]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub credentials: Option<ExplicitCredentials>,
}

/// A presign request with its target settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignTarget {
    pub bucket: String,
    pub key: String,
    pub operation: Operation,
}

impl PresignRequest {
    /// Check required fields locally, falling back to `default_bucket`
    pub fn target(&self, default_bucket: &str) -> Result<PresignTarget, ValidationErrors> {
        let mut errors = Vec::new();

        let bucket = non_blank(self.bucket.as_deref()).unwrap_or(default_bucket);
        if bucket.trim().is_empty() {
            errors.push(FieldError::new("bucket", "is required and no default is configured"));
        }

        let key = non_blank(self.key.as_deref());
        if key.is_none() {
            errors.push(FieldError::new("key", "is required"));
        }

        let operation = match non_blank(self.operation.as_deref()) {
            None => {
                errors.push(FieldError::new("operation", "is required"));
                None
            }
            Some(raw) => match raw.parse::<Operation>() {
                Ok(op) => Some(op),
                Err(reason) => {
                    errors.push(FieldError::new("operation", reason));
                    None
                }
            },
        };

        match (key, operation) {
            (Some(key), Some(operation)) if errors.is_empty() => Ok(PresignTarget {
                bucket: bucket.to_string(),
                key: key.to_string(),
                operation,
            }),
            _ => Err(ValidationErrors(errors)),
        }
    }
}

/// Input/output URL pair for one batch run
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignPairRequest {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default, alias = "input_key")]
    pub input_key: Option<String>,
    #[serde(default, alias = "output_key")]
    pub output_key: Option<String>,
    #[serde(default, alias = "expiresIn", alias = "expires_in")]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub credentials: Option<ExplicitCredentials>,
}

impl PresignPairRequest {
    /// `(bucket, input_key, output_key)`; the output key is `None` when it
    /// should be derived from the input key
    pub fn keys<'a>(
        &'a self,
        default_bucket: &'a str,
    ) -> Result<(&'a str, &'a str, Option<&'a str>), ValidationErrors> {
        let bucket = non_blank(self.bucket.as_deref()).unwrap_or(default_bucket);
        let mut errors = Vec::new();

        if bucket.trim().is_empty() {
            errors.push(FieldError::new("bucket", "is required and no default is configured"));
        }
        let input_key = non_blank(self.input_key.as_deref());
        if input_key.is_none() {
            errors.push(FieldError::new("inputKey", "is required"));
        }

        match input_key {
            Some(input_key) if errors.is_empty() => {
                Ok((bucket, input_key, non_blank(self.output_key.as_deref())))
            }
            _ => Err(ValidationErrors(errors)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignPairResponse {
    pub input_url: String,
    pub output_url: String,
    pub input_key: String,
    pub output_key: String,
    pub bucket: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
