//! Dependency health aggregation for `GET /api/health`

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::batch::BatchService;
use crate::config::{HealthConfig, StorageConfig};
use crate::storage::CredentialResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub batch_api: ProbeResult,
    pub storage: ProbeResult,
    pub overall: Overall,
    pub batch_api_url: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.overall == Overall::Healthy
    }
}

#[derive(Clone)]
pub struct HealthAggregator {
    batch: Arc<dyn BatchService>,
    credentials: CredentialResolver,
    bucket: String,
    probe_timeout: Duration,
    overall_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(
        batch: Arc<dyn BatchService>,
        credentials: CredentialResolver,
        storage: &StorageConfig,
        health: &HealthConfig,
    ) -> Self {
        Self {
            batch,
            credentials,
            bucket: storage.bucket.clone(),
            probe_timeout: health.probe_timeout(),
            overall_timeout: health.overall_timeout(),
        }
    }

    /// Probe both dependencies concurrently. Never takes longer than the
    /// overall timeout: a probe still running at its bound is reported
    /// unreachable.
    pub async fn check(&self) -> HealthStatus {
        let bound = self.probe_timeout.min(self.overall_timeout);

        let (batch_api, storage) = tokio::join!(
            probe(bound, async {
                self.batch.health().await.map_err(|e| e.to_string())
            }),
            probe(bound, self.storage_ready()),
        );

        let overall = if batch_api.reachable && storage.reachable {
            Overall::Healthy
        } else {
            Overall::Degraded
        };

        if overall == Overall::Degraded {
            tracing::warn!(
                batch_api = batch_api.reachable,
                storage = storage.reachable,
                "Health check degraded"
            );
        }

        HealthStatus {
            batch_api,
            storage,
            overall,
            batch_api_url: self.batch.base_url().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Storage is usable when a bucket is configured and the default chain
    /// yields credentials. Storage itself is not contacted.
    async fn storage_ready(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("no default bucket configured".to_string());
        }
        self.credentials
            .resolve_default()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

async fn probe<F>(bound: Duration, check: F) -> ProbeResult
where
    F: Future<Output = Result<(), String>>,
{
    let started = Instant::now();
    let outcome = timeout(bound, check).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(Ok(())) => ProbeResult {
            reachable: true,
            latency_ms,
            detail: None,
        },
        Ok(Err(detail)) => ProbeResult {
            reachable: false,
            latency_ms,
            detail: Some(detail),
        },
        Err(_) => ProbeResult {
            reachable: false,
            latency_ms,
            detail: Some(format!("timed out after {}ms", bound.as_millis())),
        },
    }
}
