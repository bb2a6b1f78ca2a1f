//! Batch job data model.
//!
//! Two shapes meet here:
//! - the local request posted by the UI ([`CreateBatchRequest`]), which
//!   also accepts the field names the existing submission scripts use,
//! - the remote batch service's wire shape ([`CreateBatchWire`] out,
//!   [`BatchJob`] / [`BatchList`] in), an OpenAI-style batch resource.
//!
//! A submission as posted by the UI:
//!
//! ```json
//! {
//!   "id": "batch-001",
//!   "input": "s3://bucket/in.tar",
//!   "endpoint": "/v1/chat/completions",
//!   "window": "24h",
//!   "metadata": { "model": "OpenGVLab/InternVL3-38B-Instruct" }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::humanize::HumanDuration;

pub type Metadata = BTreeMap<String, String>;

/// Metadata key carrying the routing model in v2 mode
pub const MODEL_METADATA_KEY: &str = "model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Validating,
    InProgress,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    Expired,
    /// Reported by the remote but not known here; kept rather than rejected
    #[serde(other)]
    Unknown,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelling => "cancelling",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Expired => "expired",
            BatchStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled | BatchStatus::Expired
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Batch resource as owned by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub input_file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub completion_window: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub status: BatchStatus,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_counts: Option<RequestCounts>,
    /// Remote error detail, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

/// List envelope returned by `GET /v1/batches`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchList {
    #[serde(default)]
    pub data: Vec<BatchJob>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
}

/// List query, passed through to the remote service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub status: Option<BatchStatus>,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    #[serde(default)]
    pub after: Option<String>,
}

pub const MAX_LIST_LIMIT: u32 = 500;

fn default_list_limit() -> u32 {
    100
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: default_list_limit(),
            after: None,
        }
    }
}

/// Batch creation payload as posted by the UI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBatchRequest {
    #[serde(default, alias = "batch_id")]
    pub id: Option<String>,
    #[serde(default, alias = "input_file_id")]
    pub input: Option<String>,
    #[serde(default, alias = "output_file_id")]
    pub output: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, alias = "completion_window")]
    pub window: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// A creation payload that passed validation. Only the validator builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBatchRequest {
    pub(crate) id: String,
    pub(crate) input: String,
    pub(crate) output: Option<String>,
    pub(crate) endpoint: String,
    pub(crate) window: HumanDuration,
    pub(crate) metadata: Metadata,
}

impl ValidatedBatchRequest {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn window(&self) -> &HumanDuration {
        &self.window
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata.get(MODEL_METADATA_KEY).map(String::as_str)
    }

    /// Remote wire shape for `POST /v1/batches`
    pub fn to_wire(&self) -> CreateBatchWire {
        CreateBatchWire {
            id: self.id.clone(),
            input_file_id: self.input.clone(),
            output_file_id: self.output.clone(),
            endpoint: self.endpoint.clone(),
            completion_window: self.window.as_str().to_string(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBatchWire {
    pub id: String,
    pub input_file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_id: Option<String>,
    pub endpoint: String,
    pub completion_window: String,
    #[serde(default)]
    pub metadata: Metadata,
}
