//! Object storage capability brokering
//!
//! batchgate never reads or writes objects itself. It resolves credentials
//! ([`credentials`]) and turns them into short-lived presigned URLs
//! ([`signer`]) that the batch service or the browser use directly.

pub mod credentials;
pub mod signer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use credentials::{
    CredentialChain, CredentialError, CredentialProvider, CredentialResolver, Credentials,
    EnvCredentialProvider, ExplicitCredentials, StaticCredentialProvider,
};
pub use signer::{S3UrlSigner, SignRequest};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid bucket name '{0}'")]
    InvalidBucket(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Access a presigned URL grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[serde(alias = "GET", alias = "read")]
    Get,
    #[serde(alias = "PUT", alias = "write")]
    Put,
}

impl Operation {
    pub fn method(self) -> reqwest::Method {
        match self {
            Operation::Get => reqwest::Method::GET,
            Operation::Put => reqwest::Method::PUT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Put => "put",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "get" | "GET" | "read" => Ok(Operation::Get),
            "put" | "PUT" | "write" => Ok(Operation::Put),
            other => Err(format!("unsupported operation '{other}', expected 'get' or 'put'")),
        }
    }
}

/// A signed, time-limited URL. The query string is a bearer capability,
/// so `Debug` only shows scheme, host and path.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub operation: Operation,
    pub bucket: String,
    pub key: String,
}

impl PresignedUrl {
    /// URL with the signature stripped, safe for logs
    pub fn redacted(&self) -> String {
        redact_url(&self.url)
    }
}

impl fmt::Debug for PresignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresignedUrl")
            .field("url", &self.redacted())
            .field("expires_at", &self.expires_at)
            .field("operation", &self.operation)
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish()
    }
}

pub fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}

/// Output key used when the caller only names the input object:
/// `outputs/{input file name}/{timestamp}.tar.gz`
pub fn derive_output_key(input_key: &str, now: DateTime<Utc>) -> String {
    let name = input_key
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(input_key);
    format!(
        "outputs/{}/{}.tar.gz",
        name,
        now.format("%Y-%m-%dT%H:%M:%S%.6f")
    )
}
