//! Storage credential resolution
//!
//! Precedence, highest first:
//! 1. credentials supplied explicitly with the request,
//! 2. the default chain injected at startup, which is itself ordered:
//!    static credentials from configuration, then the process environment
//!    (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`).
//!
//! Nothing is cached: every request resolves from scratch so one caller's
//! keys can never be served to another.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no storage credentials supplied and none found in the default chain")]
    Missing,

    #[error("{0} is required when {1} is provided")]
    Incomplete(&'static str, &'static str),
}

/// Resolved storage credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Credentials as they arrive in a request body. Accepts both the short
/// names and the `aws_*` names used by existing scripts.
#[derive(Clone, Default, Deserialize)]
pub struct ExplicitCredentials {
    #[serde(default, alias = "aws_access_key_id", alias = "accessKeyId")]
    pub access_key_id: Option<String>,
    #[serde(default, alias = "aws_secret_access_key", alias = "secretAccessKey")]
    pub secret_access_key: Option<String>,
    #[serde(default, alias = "aws_session_token", alias = "sessionToken")]
    pub session_token: Option<String>,
}

impl fmt::Debug for ExplicitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplicitCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ExplicitCredentials {
    /// `Ok(None)` when every field is blank, i.e. the caller supplied nothing
    fn into_credentials(self) -> Result<Option<Credentials>, CredentialError> {
        let access_key_id = non_blank(self.access_key_id);
        let secret_access_key = non_blank(self.secret_access_key);
        let session_token = non_blank(self.session_token);

        match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token,
            })),
            (Some(_), None) => Err(CredentialError::Incomplete(
                "secret_access_key",
                "access_key_id",
            )),
            (None, Some(_)) => Err(CredentialError::Incomplete(
                "access_key_id",
                "secret_access_key",
            )),
            (None, None) if session_token.is_some() => Err(CredentialError::Incomplete(
                "access_key_id",
                "session_token",
            )),
            (None, None) => Ok(None),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A source of ambient credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Provider name for logs and health detail
    fn name(&self) -> &'static str;

    /// Yield credentials, or `None` if this source has nothing to offer
    async fn provide(&self) -> Option<Credentials>;
}

/// Fixed credentials, typically loaded from configuration secrets
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: Option<Credentials>,
}

impl StaticCredentialProvider {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        let credentials = match (&storage.access_key, &storage.secret_key) {
            (Some(access), Some(secret)) => Some(Credentials {
                access_key_id: access.clone(),
                secret_access_key: secret.clone(),
                session_token: storage.session_token.clone(),
            }),
            _ => None,
        };
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    fn name(&self) -> &'static str {
        "config"
    }

    async fn provide(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Standard AWS environment variables, read on every call
#[derive(Clone)]
pub struct EnvCredentialProvider {
    lookup: EnvLookup,
}

impl EnvCredentialProvider {
    pub fn from_process() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn provide(&self) -> Option<Credentials> {
        let access = non_blank((self.lookup)("AWS_ACCESS_KEY_ID"))?;
        let secret = non_blank((self.lookup)("AWS_SECRET_ACCESS_KEY"))?;
        Some(Credentials {
            access_key_id: access,
            secret_access_key: secret,
            session_token: non_blank((self.lookup)("AWS_SESSION_TOKEN")),
        })
    }
}

/// Ordered list of providers; the first one yielding credentials wins
#[derive(Clone, Default)]
pub struct CredentialChain {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Configuration secrets first, then the process environment
    pub fn default_for(storage: &StorageConfig) -> Self {
        Self::new()
            .with(StaticCredentialProvider::from_config(storage))
            .with(EnvCredentialProvider::from_process())
    }
}

#[async_trait]
impl CredentialProvider for CredentialChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn provide(&self) -> Option<Credentials> {
        for provider in &self.providers {
            if let Some(credentials) = provider.provide().await {
                tracing::debug!(provider = provider.name(), "Resolved default credentials");
                return Some(credentials);
            }
        }
        None
    }
}

/// Chooses between request-supplied and default credentials
#[derive(Clone)]
pub struct CredentialResolver {
    default_chain: Arc<dyn CredentialProvider>,
}

impl CredentialResolver {
    pub fn new(default_chain: Arc<dyn CredentialProvider>) -> Self {
        Self { default_chain }
    }

    pub async fn resolve(
        &self,
        explicit: Option<ExplicitCredentials>,
    ) -> Result<Credentials, CredentialError> {
        if let Some(explicit) = explicit {
            if let Some(credentials) = explicit.into_credentials()? {
                tracing::debug!(access_key_id = %credentials.access_key_id, "Using request credentials");
                return Ok(credentials);
            }
        }
        self.resolve_default().await
    }

    pub async fn resolve_default(&self) -> Result<Credentials, CredentialError> {
        self.default_chain
            .provide()
            .await
            .ok_or(CredentialError::Missing)
    }
}
