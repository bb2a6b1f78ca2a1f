//! SigV4 query-string signing through `object_store`
//!
//! A throwaway `AmazonS3` client is built per request from the resolved
//! credentials. With static credentials `Signer::signed_url` is pure
//! computation: no request ever leaves the process.

use chrono::Utc;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StoragePath;
use object_store::signer::Signer;
use std::time::Duration;

use super::{Credentials, Operation, PresignedUrl, Result, StorageError};
use crate::config::{PresignConfig, StorageConfig};

const MAX_BUCKET_LEN: usize = 63;
const MAX_KEY_BYTES: usize = 1024;

/// What to sign
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub bucket: String,
    pub key: String,
    pub operation: Operation,
    /// Requested lifetime in seconds; `None`, zero or negative means default
    pub expiry_secs: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct S3UrlSigner {
    region: String,
    endpoint: Option<String>,
    default_expiry: Duration,
    max_expiry: Duration,
}

impl S3UrlSigner {
    pub fn new(storage: &StorageConfig, presign: &PresignConfig) -> Self {
        Self {
            region: storage.region.clone(),
            endpoint: storage.endpoint.clone(),
            default_expiry: Duration::from_secs(presign.default_expiry_secs),
            max_expiry: Duration::from_secs(presign.max_expiry_secs),
        }
    }

    /// Clamp a requested lifetime into `(0, max]`
    pub fn effective_expiry(&self, requested_secs: Option<i64>) -> Duration {
        match requested_secs {
            Some(secs) if secs > 0 => {
                let requested = Duration::from_secs(secs.unsigned_abs());
                requested.min(self.max_expiry)
            }
            _ => self.default_expiry,
        }
    }

    pub async fn sign(&self, request: &SignRequest, credentials: &Credentials) -> Result<PresignedUrl> {
        validate_bucket(&request.bucket)?;
        validate_key(&request.key)?;

        let expiry = self.effective_expiry(request.expiry_secs);
        let generated_at = Utc::now();
        let lifetime = chrono::Duration::from_std(expiry)
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&request.bucket)
            .with_region(&self.region)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key);
        if let Some(token) = &credentials.session_token {
            builder = builder.with_token(token);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let store = builder.build()?;

        let path = storage_path(&request.key)?;
        let url = store
            .signed_url(request.operation.method(), &path, expiry)
            .await?;

        tracing::info!(
            bucket = %request.bucket,
            key = %request.key,
            operation = %request.operation,
            expiry_secs = expiry.as_secs(),
            "Generated presigned URL"
        );

        Ok(PresignedUrl {
            url: url.to_string(),
            expires_at: generated_at + lifetime,
            operation: request.operation,
            bucket: request.bucket.clone(),
            key: request.key.clone(),
        })
    }
}

fn validate_bucket(bucket: &str) -> Result<()> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    let valid_edges = !bucket.starts_with(['.', '-']) && !bucket.ends_with(['.', '-']);

    if bucket.is_empty() || bucket.len() > MAX_BUCKET_LEN || !valid_chars || !valid_edges {
        return Err(StorageError::InvalidBucket(bucket.to_string()));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(StorageError::InvalidKey(format!(
            "key exceeds {MAX_KEY_BYTES} bytes"
        )));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey("key must not start with '/'".to_string()));
    }
    if key.ends_with('/') {
        return Err(StorageError::InvalidKey("key must not end with '/'".to_string()));
    }
    if key.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(
            "key contains control characters".to_string(),
        ));
    }
    if let Some(segment) = key
        .split('/')
        .find(|segment| matches!(*segment, "" | "." | ".."))
    {
        return Err(StorageError::InvalidKey(format!(
            "key contains an invalid segment {segment:?}"
        )));
    }
    Ok(())
}

/// Object path for an already validated key, kept byte-for-byte.
///
/// `Path::from` escapes characters such as `%` before the URL is encoded,
/// which would sign a different object than the one asked for.
fn storage_path(key: &str) -> Result<StoragePath> {
    let path = StoragePath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;
    if path.as_ref() != key {
        return Err(StorageError::InvalidKey(format!(
            "key would be stored as {:?}",
            path.as_ref()
        )));
    }
    Ok(path)
}
