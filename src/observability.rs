//! Tracing setup and request counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Process-wide counters, exposed on `GET /api/metrics`
#[derive(Debug, Default)]
pub struct Metrics {
    batches_created: AtomicU64,
    batch_requests: AtomicU64,
    presigned_urls_issued: AtomicU64,
    validation_failures: AtomicU64,
    upstream_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_created(&self) {
        self.batches_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_created", "Metric incremented");
    }

    /// Any call forwarded to the batch service
    pub fn batch_request(&self) {
        self.batch_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn presigned_urls_issued(&self, count: u64) {
        self.presigned_urls_issued.fetch_add(count, Ordering::Relaxed);
        tracing::debug!(counter = "presigned_urls_issued", count, "Metric incremented");
    }

    pub fn validation_failed(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "validation_failures", "Metric incremented");
    }

    pub fn upstream_failed(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "upstream_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_created: self.batches_created.load(Ordering::Relaxed),
            batch_requests: self.batch_requests.load(Ordering::Relaxed),
            presigned_urls_issued: self.presigned_urls_issued.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub batches_created: u64,
    pub batch_requests: u64,
    pub presigned_urls_issued: u64,
    pub validation_failures: u64,
    pub upstream_failures: u64,
}
