use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub presign: PresignConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound for JSON request bodies
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

/// Remote batch service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Model-routing mode: creation requires `metadata.model`
    #[serde(default)]
    pub v2_mode: bool,
    #[serde(default = "default_endpoint")]
    pub default_endpoint: String,
    #[serde(default = "default_completion_window")]
    pub default_completion_window: String,
}

impl BatchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_url: default_batch_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            v2_mode: false,
            default_endpoint: default_endpoint(),
            default_completion_window: default_completion_window(),
        }
    }
}

fn default_batch_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_endpoint() -> String {
    "/v1/chat/completions".to_string()
}

fn default_completion_window() -> String {
    "24h".to_string()
}

/// Object storage configuration used for URL signing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3-compatible endpoint (MinIO, R2, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// Secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
    #[serde(skip)]
    pub session_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            session_token: None,
        }
    }
}

fn default_bucket() -> String {
    "modular-batch-api-batches".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Presigned URL expiry policy (seconds)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresignConfig {
    #[serde(default = "default_expiry_secs")]
    pub default_expiry_secs: u64,
    #[serde(default = "default_max_expiry_secs")]
    pub max_expiry_secs: u64,
}

impl Default for PresignConfig {
    fn default() -> Self {
        Self {
            default_expiry_secs: default_expiry_secs(),
            max_expiry_secs: default_max_expiry_secs(),
        }
    }
}

fn default_expiry_secs() -> u64 {
    3_600
}

fn default_max_expiry_secs() -> u64 {
    604_800 // 7 days, the SigV4 ceiling
}

/// Health probe bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            overall_timeout_ms: default_overall_timeout_ms(),
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_overall_timeout_ms() -> u64 {
    5_000
}
