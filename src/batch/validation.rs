//! Batch creation and list-query validation.
//!
//! Every failing field is collected, not only the first, so the UI can
//! highlight all of them at once. Failures are reported in field order:
//! `id`, `input`, `output`, `endpoint`, `window`, `metadata.model`.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::models::{
    BatchStatus, CreateBatchRequest, ListFilter, MAX_LIST_LIMIT, MODEL_METADATA_KEY,
    ValidatedBatchRequest,
};
use crate::config::BatchConfig;
use crate::humanize::{HumanDuration, ParseError};

const MIN_ID_LEN: usize = 3;
const MAX_ID_LEN: usize = 128;
const MAX_COMPLETION_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// One or more rejected fields; never empty
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: &'static str, reason: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, reason)])
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn first_field(&self) -> Option<&'static str> {
        self.0.first().map(|e| e.field)
    }
}

fn summarize(errors: &[FieldError]) -> String {
    match errors {
        [] => "validation failed".to_string(),
        [only] => format!("field '{}' {}", only.field, only.reason),
        [first, rest @ ..] => format!(
            "field '{}' {} (and {} more)",
            first.field,
            first.reason,
            rest.len()
        ),
    }
}

/// Enforces the creation contract before anything is sent upstream
#[derive(Debug, Clone)]
pub struct BatchValidator {
    v2_mode: bool,
    default_endpoint: String,
    default_window: HumanDuration,
}

impl BatchValidator {
    pub fn new(config: &BatchConfig) -> Result<Self, ParseError> {
        Ok(Self {
            v2_mode: config.v2_mode,
            default_endpoint: config.default_endpoint.clone(),
            default_window: config.default_completion_window.parse()?,
        })
    }

    pub fn validate(
        &self,
        request: CreateBatchRequest,
    ) -> Result<ValidatedBatchRequest, ValidationErrors> {
        let mut errors = Vec::new();

        let id = check_id(request.id.as_deref(), &mut errors);
        let input = check_uri("input", request.input.as_deref(), true, &mut errors);
        let output = check_uri("output", request.output.as_deref(), false, &mut errors);
        let endpoint = self.check_endpoint(request.endpoint.as_deref(), &mut errors);
        let window = self.check_window(request.window.as_deref(), &mut errors);

        let metadata = request.metadata.unwrap_or_default();
        if self.v2_mode {
            let has_model = metadata
                .get(MODEL_METADATA_KEY)
                .is_some_and(|model| !model.trim().is_empty());
            if !has_model {
                errors.push(FieldError::new(
                    "metadata.model",
                    "is required in v2 mode",
                ));
            }
        }

        match (id, input, endpoint, window) {
            (Some(id), Some(input), Some(endpoint), Some(window)) if errors.is_empty() => {
                Ok(ValidatedBatchRequest {
                    id,
                    input,
                    output,
                    endpoint,
                    window,
                    metadata,
                })
            }
            _ => Err(ValidationErrors(errors)),
        }
    }

    fn check_endpoint(&self, endpoint: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
        match endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            None => Some(self.default_endpoint.clone()),
            Some(endpoint) if endpoint.starts_with('/') => Some(endpoint.to_string()),
            Some(_) => {
                errors.push(FieldError::new("endpoint", "must start with '/'"));
                None
            }
        }
    }

    fn check_window(&self, window: Option<&str>, errors: &mut Vec<FieldError>) -> Option<HumanDuration> {
        let Some(raw) = window.map(str::trim).filter(|w| !w.is_empty()) else {
            return Some(self.default_window.clone());
        };

        match raw.parse::<HumanDuration>() {
            Ok(spec) if spec.duration().is_zero() => {
                errors.push(FieldError::new("window", "must be positive"));
                None
            }
            Ok(spec) if spec.duration() > MAX_COMPLETION_WINDOW => {
                errors.push(FieldError::new("window", "must not exceed 7d"));
                None
            }
            Ok(spec) => Some(spec),
            Err(err) => {
                errors.push(FieldError::new(
                    "window",
                    format!("must be a duration like '24h' ({err})"),
                ));
                None
            }
        }
    }
}

fn check_id(id: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
    let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
        errors.push(FieldError::new("id", "is required"));
        return None;
    };

    let len = id.chars().count();
    let reason = if len < MIN_ID_LEN {
        Some(format!("must be at least {MIN_ID_LEN} characters long"))
    } else if len > MAX_ID_LEN {
        Some(format!("must be at most {MAX_ID_LEN} characters long"))
    } else if id.chars().any(|c| c.is_whitespace() || c == '/') {
        Some("must not contain whitespace or '/'".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => {
            errors.push(FieldError::new("id", reason));
            None
        }
        None => Some(id.to_string()),
    }
}

fn check_uri(
    field: &'static str,
    value: Option<&str>,
    required: bool,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        if required {
            errors.push(FieldError::new(field, "is required"));
        }
        return None;
    };

    match reqwest::Url::parse(value) {
        Ok(_) => Some(value.to_string()),
        Err(err) => {
            errors.push(FieldError::new(field, format!("must be an absolute URI ({err})")));
            None
        }
    }
}

/// Validate a list query before it is passed through
pub fn validate_list_filter(filter: ListFilter) -> Result<ListFilter, ValidationErrors> {
    let mut errors = Vec::new();

    if !(1..=MAX_LIST_LIMIT).contains(&filter.limit) {
        errors.push(FieldError::new(
            "limit",
            format!("must be between 1 and {MAX_LIST_LIMIT}"),
        ));
    }
    if filter.status == Some(BatchStatus::Unknown) {
        errors.push(FieldError::new("status", "is not a known batch status"));
    }

    let after = filter.after.filter(|a| !a.trim().is_empty());

    if errors.is_empty() {
        Ok(ListFilter { after, ..filter })
    } else {
        Err(ValidationErrors(errors))
    }
}
