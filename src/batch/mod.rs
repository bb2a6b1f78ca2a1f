//! Batch lifecycle: request validation and the remote batch service.

pub mod client;
pub mod error;
pub mod memory;
pub mod models;
pub mod validation;

pub use client::{BatchService, HttpBatchClient};
pub use error::BatchError;
pub use memory::InMemoryBatchService;
pub use models::{
    BatchJob, BatchList, BatchStatus, CreateBatchRequest, ListFilter, RequestCounts,
    ValidatedBatchRequest,
};
pub use validation::{BatchValidator, FieldError, ValidationErrors, validate_list_filter};
