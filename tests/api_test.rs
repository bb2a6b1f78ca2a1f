use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use flate2::{Compression, write::GzEncoder};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use batchgate::api::{AppState, router};
use batchgate::batch::memory::Call;
use batchgate::batch::{BatchJob, BatchStatus, InMemoryBatchService, RequestCounts};
use batchgate::config::{ByteSize, Config};
use batchgate::storage::{Credentials, StaticCredentialProvider};

struct TestApp {
    router: Router,
    batch: Arc<InMemoryBatchService>,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        ServiceExt::<Request<Body>>::oneshot(self.router.clone(), request)
            .await
            .unwrap()
    }
}

fn create_test_config() -> Config {
    let config_toml = r#"
[batch]
base_url = "http://batch.test:8000"

[storage]
bucket = "test-bucket"
region = "us-east-1"
"#;

    toml::from_str(config_toml).expect("Failed to parse test config")
}

fn default_credentials() -> Option<Credentials> {
    Some(Credentials::new(
        "AKIDEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
    ))
}

/// Router over the in-memory batch service with static default credentials
fn build_test_app_with(config: Config, credentials: Option<Credentials>) -> TestApp {
    let batch = Arc::new(InMemoryBatchService::new());
    let state = AppState::new(
        config,
        batch.clone(),
        Arc::new(StaticCredentialProvider::new(credentials)),
    )
    .expect("Failed to build app state");

    TestApp {
        router: router(state),
        batch,
    }
}

fn build_test_app() -> TestApp {
    build_test_app_with(create_test_config(), default_credentials())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn post_gzip(uri: &str, compressed: Vec<u8>) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(compressed))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn valid_batch() -> Value {
    json!({
        "id": "batch-001",
        "input": "s3://bucket/in.tar",
        "endpoint": "/v1/chat/completions",
        "window": "24h"
    })
}

fn seeded_job(id: &str, status: BatchStatus, failed: u64) -> BatchJob {
    let counts = RequestCounts {
        total: 10,
        completed: 10 - failed,
        failed,
    };
    serde_json::from_value(json!({
        "id": id,
        "endpoint": "/v1/chat/completions",
        "input_file_id": "s3://bucket/in.tar",
        "completion_window": "24h",
        "status": status,
        "request_counts": counts,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_create_batch_success() {
    let app = build_test_app();

    let response = app.send(post_json("/api/batches", valid_batch())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let job = body_json(response).await;
    assert_eq!(job["id"], "batch-001");
    assert_eq!(job["status"], "validating");
    assert_eq!(app.batch.calls(Call::Create), 1);
}

#[tokio::test]
async fn test_create_then_get_batch() {
    let app = build_test_app();
    app.send(post_json("/api/batches", valid_batch())).await;

    let response = app.send(get("/api/batches/batch-001")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let job = body_json(response).await;
    assert_eq!(job["id"], "batch-001");
    assert_eq!(job["input_file_id"], "s3://bucket/in.tar");
}

#[tokio::test]
async fn test_create_duplicate_is_conflict() {
    let app = build_test_app();
    app.send(post_json("/api/batches", valid_batch())).await;

    let response = app.send(post_json("/api/batches", valid_batch())).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn test_create_missing_input_never_reaches_service() {
    let app = build_test_app();

    let response = app
        .send(post_json("/api/batches", json!({"id": "batch-001"})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert_eq!(error["details"][0]["field"], "input");
    assert_eq!(app.batch.remote_calls(), 0);
}

#[tokio::test]
async fn test_create_reports_every_invalid_field() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/batches",
            json!({"id": "a b", "input": "relative.tar", "window": "30d"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = body_json(response).await;
    let fields: Vec<&str> = error["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["id", "input", "window"]);
    assert!(error["message"].as_str().unwrap().contains("'id'"));
}

#[tokio::test]
async fn test_v2_mode_requires_model() {
    let mut config = create_test_config();
    config.batch.v2_mode = true;
    let app = build_test_app_with(config, default_credentials());

    let response = app.send(post_json("/api/batches", valid_batch())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["details"][0]["field"],
        "metadata.model"
    );
    assert_eq!(app.batch.remote_calls(), 0);

    let mut with_model = valid_batch();
    with_model["metadata"] = json!({"model": "OpenGVLab/InternVL3-38B-Instruct"});
    let response = app.send(post_json("/api/batches", with_model)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_get_batch_not_found() {
    let app = build_test_app();

    let response = app.send(get("/api/batches/unknown-id")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_retry_running_batch_is_conflict() {
    let app = build_test_app();
    app.batch
        .insert(seeded_job("batch-002", BatchStatus::InProgress, 0))
        .await;

    let response = app.send(post_empty("/api/batches/batch-002/retry")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Untouched by the rejected retry
    let job = body_json(app.send(get("/api/batches/batch-002")).await).await;
    assert_eq!(job["status"], "in_progress");
}

#[tokio::test]
async fn test_retry_failed_items() {
    let app = build_test_app();
    app.batch
        .insert(seeded_job("batch-003", BatchStatus::Completed, 2))
        .await;

    let response = app.send(post_empty("/api/batches/batch-003/retry")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "validating");
}

#[tokio::test]
async fn test_cancel_batch() {
    let app = build_test_app();
    app.send(post_json("/api/batches", valid_batch())).await;

    let response = app.send(post_empty("/api/batches/batch-001/cancel")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelling");

    let response = app.send(post_empty("/api/batches/batch-001/cancel")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.send(post_empty("/api/batches/unknown-id/cancel")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_batches_by_status() {
    let app = build_test_app();
    app.batch
        .insert(seeded_job("batch-001", BatchStatus::Completed, 0))
        .await;
    app.batch
        .insert(seeded_job("batch-002", BatchStatus::Failed, 5))
        .await;

    let response = app.send(get("/api/batches?status=failed")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let list = body_json(response).await;
    let data = list["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], "batch-002");

    let all = body_json(app.send(get("/api/batches")).await).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_rejects_bad_query() {
    let app = build_test_app();

    let response = app.send(get("/api/batches?limit=0")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_FAILED");

    let response = app.send(get("/api/batches?status=bogus")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(get("/api/batches?limit=lots")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert_eq!(error["details"][0]["field"], "query");

    assert_eq!(app.batch.calls(Call::List), 0);
}

#[tokio::test]
async fn test_presigned_put_url() {
    let app = build_test_app();
    let before = Utc::now();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"bucket": "b", "key": "k", "operation": "put", "expiry": 3600}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response).await;
    let url = result["url"].as_str().unwrap();
    assert!(url.contains("X-Amz-Signature="));
    assert!(url.contains("X-Amz-Expires=3600"));
    assert_eq!(result["operation"], "put");

    let expires_at: DateTime<Utc> =
        serde_json::from_value(result["expiresAt"].clone()).unwrap();
    let lifetime = (expires_at - before).num_seconds();
    assert!((3599..=3601).contains(&lifetime), "lifetime {lifetime}");
}

#[tokio::test]
async fn test_presigned_url_uses_default_bucket() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"key": "inputs/batch-001.tar", "operation": "get"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response).await;
    assert_eq!(result["bucket"], "test-bucket");
    assert!(result["url"].as_str().unwrap().contains("test-bucket"));
}

#[tokio::test]
async fn test_presigned_url_explicit_credentials_win() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({
                "bucket": "b",
                "key": "k",
                "operation": "get",
                "credentials": {"accessKeyId": "AKIDEXPLICIT", "secretAccessKey": "s3cr3t"}
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let url = body_json(response).await["url"].as_str().unwrap().to_string();
    assert!(url.contains("AKIDEXPLICIT"));
    assert!(!url.contains("AKIDEXAMPLE"));
}

#[tokio::test]
async fn test_presigned_url_half_credentials_rejected() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({
                "bucket": "b",
                "key": "k",
                "operation": "get",
                "credentials": {"accessKeyId": "AKIDEXPLICIT"}
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_presigned_url_without_any_credentials() {
    let app = build_test_app_with(create_test_config(), None);

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"bucket": "b", "key": "k", "operation": "get"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
    assert_eq!(body_json(response).await["code"], "MISSING_CREDENTIALS");
}

#[tokio::test]
async fn test_presigned_url_missing_fields() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"bucket": "b", "operation": "delete"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = body_json(response).await;
    assert_eq!(error["details"][0]["field"], "key");
    assert_eq!(error["details"][1]["field"], "operation");
}

#[tokio::test]
async fn test_presigned_url_malformed_bucket_is_signing_failure() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"bucket": "Not_A_Bucket", "key": "k", "operation": "get"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error = body_json(response).await;
    assert_eq!(error["code"], "SIGNING_FAILURE");
    assert!(error.get("url").is_none());
}

#[tokio::test]
async fn test_presigned_url_key_is_signed_verbatim() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"key": "inputs/50%.tar", "operation": "get"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["key"], "inputs/50%.tar");
    let url = result["url"].as_str().unwrap();
    assert!(url.contains("/inputs/50%25.tar?"), "{url}");

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"key": "inputs//batch.tar", "operation": "get"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "SIGNING_FAILURE");
}

#[tokio::test]
async fn test_presigned_pair_derives_output_key() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls/pair",
            json!({"inputKey": "inputs/batch-001.tar", "expiry": 600}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let pair = body_json(response).await;
    assert_eq!(pair["bucket"], "test-bucket");
    assert_eq!(pair["inputKey"], "inputs/batch-001.tar");

    let output_key = pair["outputKey"].as_str().unwrap();
    assert!(output_key.starts_with("outputs/batch-001.tar/"));
    assert!(output_key.ends_with(".tar.gz"));

    assert!(pair["inputUrl"].as_str().unwrap().contains("X-Amz-Expires=600"));
    assert!(pair["outputUrl"].as_str().unwrap().contains("X-Amz-Signature="));
    assert_ne!(pair["inputUrl"], pair["outputUrl"]);
}

#[tokio::test]
async fn test_invalid_content_type() {
    let app = build_test_app();

    let request = Request::builder()
        .uri("/api/batches")
        .method("POST")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(serde_json::to_string(&valid_batch()).unwrap()))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert_eq!(error["details"][0]["field"], "content-type");
    assert_eq!(app.batch.remote_calls(), 0);
}

#[tokio::test]
async fn test_missing_content_type() {
    let app = build_test_app();

    let request = Request::builder()
        .uri("/api/generate-presigned-urls")
        .method("POST")
        .body(Body::from(r#"{"key":"k","operation":"get"}"#))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_malformed_json() {
    let app = build_test_app();

    let request = Request::builder()
        .uri("/api/batches")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"id\": "))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert_eq!(error["details"][0]["field"], "body");
    assert_eq!(app.batch.remote_calls(), 0);
}

#[tokio::test]
async fn test_wrongly_typed_field_is_validation_failure() {
    let app = build_test_app();

    let response = app
        .send(post_json(
            "/api/generate-presigned-urls",
            json!({"bucket": "b", "key": "k", "operation": "get", "expiry": "soon"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_payload_too_large() {
    let mut config = create_test_config();
    config.server.max_body_bytes = ByteSize(64);
    let app = build_test_app_with(config, default_credentials());

    let mut batch = valid_batch();
    batch["metadata"] = json!({"note": "x".repeat(256)});

    let response = app.send(post_json("/api/batches", batch)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let error = body_json(response).await;
    assert_eq!(error["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(error["message"], "payload exceeds the 64B limit");
    assert_eq!(app.batch.remote_calls(), 0);
}

#[tokio::test]
async fn test_create_batch_gzip_body() {
    let app = build_test_app();

    let compressed = gzip(valid_batch().to_string().as_bytes());
    let response = app.send(post_gzip("/api/batches", compressed)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["id"], "batch-001");
    assert_eq!(app.batch.calls(Call::Create), 1);
}

#[tokio::test]
async fn test_gzip_body_limit_applies_after_inflation() {
    let mut config = create_test_config();
    config.server.max_body_bytes = ByteSize(1024);
    let app = build_test_app_with(config, default_credentials());

    let mut batch = valid_batch();
    batch["metadata"] = json!({"note": "x".repeat(64 * 1024)});
    let compressed = gzip(batch.to_string().as_bytes());
    assert!(compressed.len() < 1024, "compressed to {}", compressed.len());

    let response = app.send(post_gzip("/api/batches", compressed)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(app.batch.remote_calls(), 0);
}

#[tokio::test]
async fn test_corrupt_gzip_body_rejected() {
    let app = build_test_app();

    let response = app
        .send(post_gzip("/api/batches", b"definitely not gzip".to_vec()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert_eq!(error["details"][0]["field"], "body");
    assert_eq!(app.batch.remote_calls(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app();

    let response = app.send(get("/api/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["overall"], "healthy");
    assert_eq!(health["batchApi"]["reachable"], true);
    assert_eq!(health["storage"]["reachable"], true);
    assert!(health["batchApiUrl"].is_string());
    assert!(health["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_degraded() {
    let app = build_test_app();
    app.batch.set_health(false);

    let response = app.send(get("/api/health")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health = body_json(response).await;
    assert_eq!(health["overall"], "degraded");
    assert_eq!(health["batchApi"]["reachable"], false);
    assert_eq!(health["storage"]["reachable"], true);
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let app = build_test_app();
    app.send(post_json("/api/batches", valid_batch())).await;
    app.send(post_json("/api/batches", json!({}))).await;
    app.send(get("/api/batches/unknown-id")).await;

    let metrics = body_json(app.send(get("/api/metrics")).await).await;
    assert_eq!(metrics["batchesCreated"], 1);
    assert_eq!(metrics["batchRequests"], 2);
    assert_eq!(metrics["validationFailures"], 1);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = build_test_app();

    let request = Request::builder()
        .uri("/api/batches")
        .method("OPTIONS")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
