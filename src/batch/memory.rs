//! In-process batch service
//!
//! Backs the integration tests and `batchgate server --fake-upstream`.
//! State transitions follow the remote's rules closely enough for the UI
//! to be exercised end to end without a real batch API.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::client::{BatchService, Result};
use super::error::BatchError;
use super::models::{BatchJob, BatchList, BatchStatus, ListFilter, RequestCounts, ValidatedBatchRequest};

pub const FAKE_BASE_URL: &str = "memory://batch-service";

/// Operations counted by [`InMemoryBatchService::calls`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Create,
    List,
    Get,
    Retry,
    Cancel,
    Health,
}

#[derive(Debug, Default)]
struct CallCounts {
    create: AtomicUsize,
    list: AtomicUsize,
    get: AtomicUsize,
    retry: AtomicUsize,
    cancel: AtomicUsize,
    health: AtomicUsize,
}

impl CallCounts {
    fn counter(&self, call: Call) -> &AtomicUsize {
        match call {
            Call::Create => &self.create,
            Call::List => &self.list,
            Call::Get => &self.get,
            Call::Retry => &self.retry,
            Call::Cancel => &self.cancel,
            Call::Health => &self.health,
        }
    }

    fn record(&self, call: Call) {
        self.counter(call).fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct InMemoryBatchService {
    jobs: RwLock<BTreeMap<String, BatchJob>>,
    calls: CallCounts,
    healthy: AtomicBool,
    health_delay: RwLock<Option<Duration>>,
}

impl Default for InMemoryBatchService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBatchService {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            calls: CallCounts::default(),
            healthy: AtomicBool::new(true),
            health_delay: RwLock::new(None),
        }
    }

    /// Seed a job as if the remote already had it
    pub async fn insert(&self, job: BatchJob) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Force a job into `status`; returns false for unknown ids
    pub async fn set_status(&self, id: &str, status: BatchStatus) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(job) => {
                job.status = status;
                job.updated_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn set_request_counts(&self, id: &str, counts: RequestCounts) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(job) => {
                job.request_counts = Some(counts);
                true
            }
            None => false,
        }
    }

    pub fn set_health(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Make every health probe take at least `delay`
    pub async fn set_health_delay(&self, delay: Option<Duration>) {
        *self.health_delay.write().await = delay;
    }

    pub fn calls(&self, call: Call) -> usize {
        self.calls.counter(call).load(Ordering::Relaxed)
    }

    /// Calls that would have reached the remote, health probes excluded
    pub fn remote_calls(&self) -> usize {
        [Call::Create, Call::List, Call::Get, Call::Retry, Call::Cancel]
            .into_iter()
            .map(|call| self.calls(call))
            .sum()
    }

    async fn transition<F>(&self, id: &str, apply: F) -> Result<BatchJob>
    where
        F: FnOnce(&mut BatchJob) -> std::result::Result<(), String>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| BatchError::NotFound(format!("batch {id} does not exist")))?;

        apply(job).map_err(BatchError::Conflict)?;
        job.updated_at = Some(Utc::now());
        Ok(job.clone())
    }
}

#[async_trait]
impl BatchService for InMemoryBatchService {
    async fn create(&self, request: &ValidatedBatchRequest) -> Result<BatchJob> {
        self.calls.record(Call::Create);

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(request.id()) {
            return Err(BatchError::Conflict(format!(
                "batch {} already exists",
                request.id()
            )));
        }

        let now = Utc::now();
        let wire = request.to_wire();
        let job = BatchJob {
            id: wire.id,
            endpoint: wire.endpoint,
            input_file_id: wire.input_file_id,
            output_file_id: wire.output_file_id,
            completion_window: wire.completion_window,
            metadata: wire.metadata,
            status: BatchStatus::Validating,
            created_at: Some(now),
            updated_at: Some(now),
            request_counts: Some(RequestCounts::default()),
            errors: None,
        };
        jobs.insert(job.id.clone(), job.clone());
        tracing::debug!(id = %job.id, "Stored batch in memory");
        Ok(job)
    }

    async fn list(&self, filter: &ListFilter) -> Result<BatchList> {
        self.calls.record(Call::List);

        let jobs = self.jobs.read().await;
        let mut matching = jobs
            .values()
            .filter(|job| filter.status.is_none_or(|status| job.status == status))
            .filter(|job| {
                filter
                    .after
                    .as_deref()
                    .is_none_or(|after| job.id.as_str() > after)
            });

        let data: Vec<BatchJob> = matching
            .by_ref()
            .take(filter.limit as usize)
            .cloned()
            .collect();
        let has_more = matching.next().is_some();

        Ok(BatchList {
            first_id: data.first().map(|job| job.id.clone()),
            last_id: data.last().map(|job| job.id.clone()),
            data,
            has_more,
        })
    }

    async fn get(&self, id: &str) -> Result<BatchJob> {
        self.calls.record(Call::Get);

        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BatchError::NotFound(format!("batch {id} does not exist")))
    }

    async fn retry(&self, id: &str) -> Result<BatchJob> {
        self.calls.record(Call::Retry);

        self.transition(id, |job| {
            let failed = job.request_counts.map_or(0, |counts| counts.failed);
            match job.status {
                BatchStatus::Completed | BatchStatus::Failed if failed > 0 => {
                    job.status = BatchStatus::Validating;
                    // Failed items are queued again
                    if let Some(counts) = job.request_counts.as_mut() {
                        counts.failed = 0;
                    }
                    Ok(())
                }
                BatchStatus::Completed | BatchStatus::Failed => {
                    Err(format!("batch {id} has no failed requests to retry"))
                }
                status => Err(format!("batch {id} is {status} and cannot be retried")),
            }
        })
        .await
    }

    async fn cancel(&self, id: &str) -> Result<BatchJob> {
        self.calls.record(Call::Cancel);

        self.transition(id, |job| match job.status {
            BatchStatus::Validating | BatchStatus::InProgress => {
                job.status = BatchStatus::Cancelling;
                Ok(())
            }
            status if status.is_terminal() => {
                Err(format!("batch {id} already finished as {status}"))
            }
            status => Err(format!("batch {id} is {status} and cannot be cancelled")),
        })
        .await
    }

    async fn health(&self) -> Result<()> {
        self.calls.record(Call::Health);

        let delay = *self.health_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.healthy.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(BatchError::UpstreamUnavailable(
                "batch service reported unhealthy".to_string(),
            ))
        }
    }

    fn base_url(&self) -> &str {
        FAKE_BASE_URL
    }
}
