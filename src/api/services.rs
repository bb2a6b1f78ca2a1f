//! Route handlers. Each one decodes, hands off to the batch service, the
//! signer or the health aggregator, and maps the outcome to a response.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;

use super::{
    error::ApiError,
    models::{PresignPairRequest, PresignPairResponse, PresignRequest},
    state::AppState,
    utils::require_json_content_type,
};
use crate::batch::{BatchError, CreateBatchRequest, ListFilter, validate_list_filter};
use crate::storage::{Operation, SignRequest, derive_output_key};

/// Dependency health (GET /api/health)
///
/// 200 when both the batch service and storage credentials are usable,
/// 503 with the same body otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// Counter snapshot (GET /api/metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Single presigned URL (POST /api/generate-presigned-urls)
pub async fn generate_presigned_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let request: PresignRequest = read_json(&state, &headers, body).await?;

    let target = request
        .target(&state.config.storage.bucket)
        .inspect_err(|_| state.metrics.validation_failed())?;
    let credentials = state.credentials.resolve(request.credentials).await?;

    let signed = state
        .signer
        .sign(
            &SignRequest {
                bucket: target.bucket,
                key: target.key,
                operation: target.operation,
                expiry_secs: request.expiry,
            },
            &credentials,
        )
        .await?;

    state.metrics.presigned_urls_issued(1);
    Ok(Json(signed))
}

/// GET URL for a batch input plus PUT URL for its output
/// (POST /api/generate-presigned-urls/pair)
///
/// Without `outputKey` the output lands under
/// `outputs/{input file name}/{timestamp}.tar.gz`.
pub async fn generate_presigned_pair(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let request: PresignPairRequest = read_json(&state, &headers, body).await?;

    let (bucket, input_key, output_key) = request
        .keys(&state.config.storage.bucket)
        .inspect_err(|_| state.metrics.validation_failed())?;
    let output_key = output_key
        .map(str::to_string)
        .unwrap_or_else(|| derive_output_key(input_key, Utc::now()));

    let credentials = state
        .credentials
        .resolve(request.credentials.clone())
        .await?;

    let input = state
        .signer
        .sign(
            &SignRequest {
                bucket: bucket.to_string(),
                key: input_key.to_string(),
                operation: Operation::Get,
                expiry_secs: request.expiry,
            },
            &credentials,
        )
        .await?;
    let output = state
        .signer
        .sign(
            &SignRequest {
                bucket: bucket.to_string(),
                key: output_key.clone(),
                operation: Operation::Put,
                expiry_secs: request.expiry,
            },
            &credentials,
        )
        .await?;

    state.metrics.presigned_urls_issued(2);
    Ok(Json(PresignPairResponse {
        expires_at: input.expires_at.min(output.expires_at),
        input_url: input.url,
        output_url: output.url,
        input_key: input.key,
        output_key: output.key,
        bucket: bucket.to_string(),
    }))
}

/// Batch listing (GET /api/batches?status=&limit=&after=)
pub async fn list_batches(
    State(state): State<AppState>,
    query: Result<Query<ListFilter>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(filter) = query.map_err(|e| {
        state.metrics.validation_failed();
        ApiError::invalid("query", e.body_text())
    })?;
    let filter = validate_list_filter(filter).inspect_err(|_| state.metrics.validation_failed())?;

    let list = forwarded(&state, state.batch.list(&filter).await)?;
    Ok(Json(list))
}

/// Single batch (GET /api/batches/{id})
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = forwarded(&state, state.batch.get(&id).await)?;
    Ok(Json(job))
}

/// Batch submission (POST /api/batches)
///
/// Validation runs before anything is sent; a rejected payload never
/// reaches the batch service.
pub async fn create_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateBatchRequest = read_json(&state, &headers, body).await?;

    let validated = state
        .validator
        .validate(request)
        .inspect_err(|errors| {
            state.metrics.validation_failed();
            tracing::info!(error = %errors, "Rejected batch submission");
        })?;

    let job = forwarded(&state, state.batch.create(&validated).await)?;
    state.metrics.batch_created();
    tracing::info!(id = %job.id, status = %job.status, "Batch created");

    Ok((StatusCode::CREATED, Json(job)))
}

/// Re-run the failed items of a finished batch (POST /api/batches/{id}/retry)
pub async fn retry_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = forwarded(&state, state.batch.retry(&id).await)?;
    tracing::info!(id = %job.id, status = %job.status, "Batch retried");
    Ok(Json(job))
}

/// Stop a running batch (POST /api/batches/{id}/cancel)
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = forwarded(&state, state.batch.cancel(&id).await)?;
    tracing::info!(id = %job.id, status = %job.status, "Batch cancellation requested");
    Ok(Json(job))
}

/// Count a batch service call and classify its failure
fn forwarded<T>(state: &AppState, result: Result<T, BatchError>) -> Result<T, ApiError> {
    state.metrics.batch_request();
    if let Err(BatchError::UpstreamUnavailable(_) | BatchError::UpstreamTimeout(_)) = &result {
        state.metrics.upstream_failed();
    }
    result.map_err(ApiError::from)
}

/// Decode a JSON body after the Content-Type check
///
/// Gzip request bodies are inflated by the decompression layer while they
/// are read, so the size limit applies to the decoded payload and reading
/// stops as soon as it is crossed.
async fn read_json<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: axum::body::Body,
) -> Result<T, ApiError> {
    require_json_content_type(headers).inspect_err(|_| state.metrics.validation_failed())?;

    let limit = state.config.server.max_body_bytes;
    let data = Limited::new(body, limit.as_usize())
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(limit)
            } else {
                ApiError::invalid("body", format!("could not be read: {err}"))
            }
        })?
        .to_bytes();

    serde_json::from_slice(&data).map_err(|err| {
        state.metrics.validation_failed();
        ApiError::from(err)
    })
}
