use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "BATCHGATE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/batchgate.toml";
const ENV_PREFIX: &str = "BATCHGATE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (`BATCHGATE__*`, then deployment variables)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    apply_environment(&mut config, |name| env::var(name).ok());

    Ok(config)
}

/// Apply the plain environment variables of the existing deployment and
/// load secrets. Secrets are never stored in TOML files, only in environment.
///
/// `lookup` abstracts the process environment so tests never mutate it.
pub fn apply_environment<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(url) = non_blank("BATCH_API_URL") {
        config.batch.base_url = url;
    }
    if let Some(bucket) = non_blank("S3_BUCKET_NAME") {
        config.storage.bucket = bucket;
    }
    if let Some(port) = non_blank("PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => {
                config.server.bind_addr = SocketAddr::new(config.server.bind_addr.ip(), port);
            }
            Err(_) => tracing::warn!(%port, "Ignoring unparsable PORT"),
        }
    }

    if let Some(access_key) = non_blank("S3_ACCESS_KEY") {
        config.storage.access_key = Some(access_key);
    }
    if let Some(secret_key) = non_blank("S3_SECRET_KEY") {
        config.storage.secret_key = Some(secret_key);
    }
    if let Some(token) = non_blank("S3_SESSION_TOKEN") {
        config.storage.session_token = Some(token);
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // BATCHGATE__BATCH__BASE_URL -> batch.base_url
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
