use super::models::Config;
use crate::humanize::HumanDuration;
use thiserror::Error;

/// Hard ceiling for request bodies regardless of configuration
const MAX_BODY_BYTES: u64 = 5 * 1024 * 1024;
/// SigV4 presigned URLs cannot outlive seven days
const SIGV4_MAX_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("batch.base_url '{url}' must be an absolute http(s) URL")]
    InvalidBaseUrl { url: String },

    #[error("storage.bucket must not be empty")]
    MissingBucket,

    #[error("storage.region must not be empty")]
    MissingRegion,

    #[error("presign expiry invalid: default {default}s, max {max}s (limit {limit}s)")]
    InvalidExpiry { default: u64, max: u64, limit: u64 },

    #[error("health timeouts invalid: probe {probe_ms}ms, overall {overall_ms}ms")]
    InvalidHealthTimeouts { probe_ms: u64, overall_ms: u64 },

    #[error("server.max_body_bytes ({actual}) must be between 1 and {limit}")]
    InvalidBodyLimit { actual: u64, limit: u64 },

    #[error("batch.default_completion_window '{window}' is not a duration")]
    InvalidCompletionWindow { window: String },

    #[error("batch.default_endpoint '{endpoint}' must start with '/'")]
    InvalidDefaultEndpoint { endpoint: String },

    #[error("{field} must be positive")]
    ZeroTimeout { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_batch(config)?;
    validate_storage(config)?;
    validate_presign(config)?;
    validate_health(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_batch(config: &Config) -> Result<(), ValidationError> {
    let batch = &config.batch;

    match reqwest::Url::parse(&batch.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => {
            return Err(ValidationError::InvalidBaseUrl {
                url: batch.base_url.clone(),
            });
        }
    }

    if batch.connect_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "batch.connect_timeout_ms",
        });
    }
    if batch.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "batch.request_timeout_ms",
        });
    }

    if !batch.default_endpoint.starts_with('/') {
        return Err(ValidationError::InvalidDefaultEndpoint {
            endpoint: batch.default_endpoint.clone(),
        });
    }

    let window_ok = batch
        .default_completion_window
        .parse::<HumanDuration>()
        .map(|window| !window.duration().is_zero())
        .unwrap_or(false);
    if !window_ok {
        return Err(ValidationError::InvalidCompletionWindow {
            window: batch.default_completion_window.clone(),
        });
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.trim().is_empty() {
        return Err(ValidationError::MissingBucket);
    }
    if config.storage.region.trim().is_empty() {
        return Err(ValidationError::MissingRegion);
    }
    Ok(())
}

fn validate_presign(config: &Config) -> Result<(), ValidationError> {
    let presign = &config.presign;
    let valid = presign.default_expiry_secs > 0
        && presign.default_expiry_secs <= presign.max_expiry_secs
        && presign.max_expiry_secs <= SIGV4_MAX_EXPIRY_SECS;

    if !valid {
        return Err(ValidationError::InvalidExpiry {
            default: presign.default_expiry_secs,
            max: presign.max_expiry_secs,
            limit: SIGV4_MAX_EXPIRY_SECS,
        });
    }
    Ok(())
}

fn validate_health(config: &Config) -> Result<(), ValidationError> {
    let health = &config.health;
    if health.probe_timeout_ms == 0 || health.probe_timeout_ms > health.overall_timeout_ms {
        return Err(ValidationError::InvalidHealthTimeouts {
            probe_ms: health.probe_timeout_ms,
            overall_ms: health.overall_timeout_ms,
        });
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    let actual = config.server.max_body_bytes.as_u64();
    if actual == 0 || actual > MAX_BODY_BYTES {
        return Err(ValidationError::InvalidBodyLimit {
            actual,
            limit: MAX_BODY_BYTES,
        });
    }
    Ok(())
}
