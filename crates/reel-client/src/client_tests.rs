//! Tests for the HTTP service client.

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reel_models::RemoteState;

use crate::config::ServiceConfig;
use crate::error::ClientError;
use crate::http::{ReelApiClient, MAX_RETRY_AFTER_MS};
use crate::retry::RetryConfig;
use crate::service::{StatusService, SubmitMetadata, UploadService};

// =============================================================================
// Test Helpers
// =============================================================================

fn client_for(server: &MockServer) -> ReelApiClient {
    let config = ServiceConfig::new(server.uri())
        .unwrap()
        .with_token("secret")
        .with_retry(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        });
    ReelApiClient::new(config).unwrap()
}

fn metadata() -> SubmitMetadata {
    SubmitMetadata {
        title: "Pitch video".into(),
        media_type: "video/mp4".into(),
        duration_secs: Some(30.0),
        related_job_id: Some("job9".into()),
    }
}

// =============================================================================
// Upload Service
// =============================================================================

#[tokio::test]
async fn test_submit_returns_server_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos/upload"))
        .and(header("authorization", "Bearer secret"))
        .and(body_string_contains("Pitch video"))
        .and(body_string_contains("job9"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "srv3" })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client_for(&server)
        .submit(Bytes::from_static(b"fake-mp4"), &metadata())
        .await
        .unwrap();

    assert_eq!(receipt.server_id, "srv3");
}

#[tokio::test]
async fn test_submit_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos/upload"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/videos/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "videoId": "srv4" })))
        .mount(&server)
        .await;

    let receipt = client_for(&server)
        .submit(Bytes::from_static(b"fake-mp4"), &metadata())
        .await
        .unwrap();

    assert_eq!(receipt.server_id, "srv4");
}

#[tokio::test]
async fn test_submit_rejected_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos/upload"))
        .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .submit(Bytes::from_static(b"fake-mp4"), &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::RequestFailed(ref msg) if msg.contains("too large")));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_submit_empty_receipt_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .submit(Bytes::from_static(b"fake-mp4"), &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidResponse(_)));
}

// =============================================================================
// Status Service
// =============================================================================

#[tokio::test]
async fn test_get_status_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/tmp1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "id": "srv1",
            "url": "https://cdn.example.com/srv1.mp4"
        })))
        .mount(&server)
        .await;

    let status = client_for(&server).get_status("tmp1").await.unwrap();

    assert_eq!(status.state, RemoteState::Completed);
    assert_eq!(status.canonical_id.as_deref(), Some("srv1"));
    assert_eq!(status.canonical_url.as_deref(), Some("https://cdn.example.com/srv1.mp4"));
}

#[tokio::test]
async fn test_get_status_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/tmp2/status"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).get_status("tmp2").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_get_status_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/srv1/status"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).get_status("srv1").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_get_status_rate_limited_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/srv1/status"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_status("srv1").await.unwrap_err();
    assert_eq!(err.retry_after_ms(), Some(3000));
}

#[tokio::test]
async fn test_get_status_huge_retry_after_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/srv1/status"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "18446744073709552"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_status("srv1").await.unwrap_err();
    assert_eq!(err.retry_after_ms(), Some(MAX_RETRY_AFTER_MS));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_submit_long_retry_after_fails_within_backoff_cap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos/upload"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let meta = metadata();
    let submit = client.submit(Bytes::from_static(b"fake-mp4"), &meta);
    let result = tokio::time::timeout(Duration::from_secs(3), submit)
        .await
        .expect("submit should not wait for the full Retry-After");

    assert!(matches!(result, Err(ClientError::RateLimited(_))));
}

#[tokio::test]
async fn test_get_status_garbage_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/srv1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_status("srv1").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}
