//! Configuration management for batchgate
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use batchgate::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `BATCHGATE__<section>__<key>`
//!
//! Examples:
//! - `BATCHGATE__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `BATCHGATE__BATCH__BASE_URL=http://batch-api:8000`
//! - `BATCHGATE__BATCH__V2_MODE=true`
//!
//! The variables of the existing deployment are honoured on top of that:
//! `BATCH_API_URL`, `S3_BUCKET_NAME`, `PORT`, and the storage secrets
//! `S3_ACCESS_KEY` / `S3_SECRET_KEY` / `S3_SESSION_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/batchgate.toml`.
//! This can be overridden using the `BATCHGATE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{BatchConfig, Config, HealthConfig, PresignConfig, ServerConfig, StorageConfig};
pub use sources::apply_environment;
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Deployment variables (`BATCH_API_URL`, `S3_BUCKET_NAME`, `PORT`)
    /// 2. Environment variables (`BATCHGATE__*`)
    /// 3. TOML file (default: `config/batchgate.toml`)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring the environment
    pub fn load_with_file(path: PathBuf) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = sources::load_from_sources(path)?;
        apply_environment(&mut config, |name| std::env::var(name).ok());
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, ignoring deployment variables
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
