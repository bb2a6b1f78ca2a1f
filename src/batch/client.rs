//! Remote batch service client

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::BatchError;
use super::models::{BatchJob, BatchList, CreateBatchWire, ListFilter, ValidatedBatchRequest};
use crate::config::BatchConfig;

pub type Result<T> = std::result::Result<T, BatchError>;

/// Narrow interface to the remote batch service.
///
/// The remote is authoritative for state transitions: implementations pass
/// its rejections through as typed errors and never retry on their own.
#[async_trait]
pub trait BatchService: Send + Sync {
    async fn create(&self, request: &ValidatedBatchRequest) -> Result<BatchJob>;

    async fn list(&self, filter: &ListFilter) -> Result<BatchList>;

    async fn get(&self, id: &str) -> Result<BatchJob>;

    /// Only meaningful for `completed`/`failed` batches with failed items
    async fn retry(&self, id: &str) -> Result<BatchJob>;

    /// Only meaningful for `validating`/`in_progress` batches
    async fn cancel(&self, id: &str) -> Result<BatchJob>;

    /// Lightweight reachability probe
    async fn health(&self) -> Result<()>;

    /// Where this service lives, for health output
    fn base_url(&self) -> &str;
}

/// reqwest-backed [`BatchService`]
#[derive(Debug, Clone)]
pub struct HttpBatchClient {
    client: Client,
    base_url: Url,
    display_url: String,
}

impl HttpBatchClient {
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(concat!("batchgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BatchError::UpstreamUnavailable(e.to_string()))?;

        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let display_url = base_url.trim_end_matches('/').to_string();
        let base_url = Url::parse(&format!("{display_url}/"))
            .map_err(|e| BatchError::UpstreamUnavailable(format!("invalid base url: {e}")))?;

        Ok(Self {
            client,
            base_url,
            display_url,
        })
    }

    /// `{base}/{segments...}`, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BatchError::UpstreamUnavailable("base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn batch_url(&self, id: &str, action: Option<&str>) -> Result<Url> {
        match action {
            Some(action) => self.url(&["v1", "batches", id, action]),
            None => self.url(&["v1", "batches", id]),
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&CreateBatchWire>,
    ) -> Result<T> {
        debug!(%method, path = url.path(), "Calling batch service");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = BatchError::from_transport(&e);
            warn!(%method, path = url.path(), error = %err, "Batch service unreachable");
            err
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BatchError::from_transport(&e))?;

        if !status.is_success() {
            let err = BatchError::from_status(status, &text);
            warn!(
                %method,
                path = url.path(),
                status = status.as_u16(),
                error = %err,
                "Batch service rejected request"
            );
            return Err(err);
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!(%method, path = url.path(), error = %e, "Undecodable batch service response");
            BatchError::UpstreamUnavailable(format!("invalid response from batch service: {e}"))
        })
    }
}

#[async_trait]
impl BatchService for HttpBatchClient {
    async fn create(&self, request: &ValidatedBatchRequest) -> Result<BatchJob> {
        let url = self.url(&["v1", "batches"])?;
        self.execute(Method::POST, url, Some(&request.to_wire()))
            .await
    }

    async fn list(&self, filter: &ListFilter) -> Result<BatchList> {
        let mut url = self.url(&["v1", "batches"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &filter.limit.to_string());
            if let Some(after) = &filter.after {
                query.append_pair("after", after);
            }
            if let Some(status) = filter.status {
                query.append_pair("status", status.as_str());
            }
        }
        self.execute(Method::GET, url, None).await
    }

    async fn get(&self, id: &str) -> Result<BatchJob> {
        let url = self.batch_url(id, None)?;
        self.execute(Method::GET, url, None).await
    }

    async fn retry(&self, id: &str) -> Result<BatchJob> {
        let url = self.batch_url(id, Some("retry"))?;
        self.execute(Method::POST, url, None).await
    }

    async fn cancel(&self, id: &str) -> Result<BatchJob> {
        let url = self.batch_url(id, Some("cancel"))?;
        self.execute(Method::POST, url, None).await
    }

    async fn health(&self) -> Result<()> {
        let url = self.url(&["health"])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BatchError::from_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BatchError::UpstreamUnavailable(format!(
                "health endpoint returned HTTP {}",
                status.as_u16()
            )))
        }
    }

    fn base_url(&self) -> &str {
        &self.display_url
    }
}
