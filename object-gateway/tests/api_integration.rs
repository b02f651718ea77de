//! API Integration Tests
//!
//! Drives the gateway router in-process with `tower::ServiceExt::oneshot`
//! against the in-memory storage backend.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use futures::{stream, StreamExt};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use object_gateway::config::Config;
use object_gateway::services::bucket::ensure_bucket;
use object_gateway::storage::{
    MemoryStore, ObjectStore, ObjectStream, StagedUpload, StorageError, StorageResult,
};
use object_gateway::{create_router, AppState};

const BOUNDARY: &str = "gateway-test-boundary";

async fn test_app_with(config: Config) -> Router {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new(config.storage.bucket.clone()));
    ensure_bucket(store.as_ref()).await.unwrap();
    create_router(AppState::new(store, config))
}

async fn test_app() -> Router {
    test_app_with(Config::default()).await
}

fn multipart_body(field: &str, filename: Option<&str>, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", field);
    if let Some(filename) = filename {
        disposition.push_str(&format!("; filename=\"{}\"", filename));
    }

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n{}\r\n", BOUNDARY, disposition).as_bytes());
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(filename: &str, data: &[u8]) -> Request<Body> {
    upload_request_with("file", Some(filename), Some("text/plain"), data)
}

fn upload_request_with(
    field: &str,
    filename: Option<&str>,
    content_type: Option<&str>,
    data: &[u8],
) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, filename, content_type, data)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    body.collect().await.unwrap().to_bytes().to_vec()
}

async fn body_to_string(body: Body) -> String {
    String::from_utf8(body_bytes(body).await).unwrap()
}

async fn list(app: &Router) -> Vec<String> {
    let response = app.clone().oneshot(get("/files/view-files")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response.into_body()).await).unwrap()
}

async fn upload(app: &Router, filename: &str, data: &[u8]) {
    let response = app.clone().oneshot(upload_request(filename, data)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "Upload success");
}

async fn error_code(response: axum::response::Response) -> String {
    let body: Value = serde_json::from_slice(&body_bytes(response.into_body()).await).unwrap();
    body["error"]["code"].as_str().unwrap().to_string()
}

// ============================================================================
// Scenario
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scenario() {
    let app = test_app().await;

    assert_eq!(list(&app).await, Vec::<String>::new());

    upload(&app, "hello.txt", b"hi").await;
    assert_eq!(list(&app).await, vec!["hello.txt".to_string()]);

    let response = app.clone().oneshot(get("/files/view/hello.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "hi");

    let response = app.clone().oneshot(delete("/files/hello.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_string(response.into_body()).await,
        "File is deleted successfully"
    );

    assert_eq!(list(&app).await, Vec::<String>::new());
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_contains_each_upload_once() {
    let app = test_app().await;

    upload(&app, "b.txt", b"b").await;
    upload(&app, "a.txt", b"a").await;
    upload(&app, "a.txt", b"a again").await;

    assert_eq!(list(&app).await, vec!["a.txt".to_string(), "b.txt".to_string()]);
}

// ============================================================================
// View / Download
// ============================================================================

#[tokio::test]
async fn test_view_is_inline() {
    let app = test_app().await;
    upload(&app, "page.html", b"<h1>hi</h1>").await;

    let response = app.clone().oneshot(get("/files/view/page.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    // Stored content type from the upload part
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
    assert_eq!(body_to_string(response.into_body()).await, "<h1>hi</h1>");
}

#[tokio::test]
async fn test_download_is_attachment() {
    let app = test_app().await;
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();

    let response = app
        .clone()
        .oneshot(upload_request_with("file", Some("photo.png"), None, &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/files/download/photo.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"photo.png\""
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(response.into_body()).await, payload);
}

#[tokio::test]
async fn test_download_unknown_extension_is_octet_stream() {
    let app = test_app().await;
    upload(&app, "data.zzzunknown", b"raw").await;

    let response = app
        .clone()
        .oneshot(get("/files/download/data.zzzunknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let app = test_app().await;

    for uri in ["/files/view/nope.txt", "/files/download/nope.txt"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(error_code(response).await, "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_encoded_traversal_is_rejected() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(get("/files/view/..%2Fsecret.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_INPUT");
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_overwrites_existing_object() {
    let app = test_app().await;
    upload(&app, "notes.txt", b"old").await;
    upload(&app, "notes.txt", b"new content").await;

    let response = app.clone().oneshot(get("/files/view/notes.txt")).await.unwrap();
    assert_eq!(body_to_string(response.into_body()).await, "new content");
}

#[tokio::test]
async fn test_empty_upload_is_stored() {
    let app = test_app().await;
    upload(&app, "empty.txt", b"").await;

    let response = app.clone().oneshot(get("/files/view/empty.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response.into_body()).await.is_empty());
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(upload_request_with("document", Some("a.txt"), None, b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_INPUT");

    let response = app
        .clone()
        .oneshot(upload_request_with("file", None, None, b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_unsafe_filename() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(upload_request("../escape.txt", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(list(&app).await, Vec::<String>::new());
}

#[tokio::test]
async fn test_upload_without_multipart_is_rejected() {
    let app = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/files/upload")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hi"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_INPUT");
}

#[tokio::test]
async fn test_oversize_upload_is_rejected() {
    let mut config = Config::default();
    config.server.max_upload_size_mb = 1;
    let app = test_app_with(config).await;

    let payload = vec![b'x'; 1024 * 1024 + 1];
    let response = app.clone().oneshot(upload_request("big.bin", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(response).await, "PAYLOAD_TOO_LARGE");
    assert_eq!(list(&app).await, Vec::<String>::new());
}

#[tokio::test]
async fn test_concurrent_uploads_keep_one_payload() {
    let app = test_app().await;
    let first = vec![b'a'; 100_000];
    let second = vec![b'b'; 100_000];

    let (r1, r2) = tokio::join!(
        app.clone().oneshot(upload_request("race.bin", &first)),
        app.clone().oneshot(upload_request("race.bin", &second)),
    );
    assert_eq!(r1.unwrap().status(), StatusCode::OK);
    assert_eq!(r2.unwrap().status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/files/view/race.bin")).await.unwrap();
    let stored = body_bytes(response.into_body()).await;
    assert!(stored == first || stored == second);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_missing_object_succeeds() {
    let app = test_app().await;

    let response = app.clone().oneshot(delete("/files/never-existed.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_string(response.into_body()).await,
        "File is deleted successfully"
    );
}

#[tokio::test]
async fn test_delete_objects_named_like_static_routes() {
    let app = test_app().await;
    upload(&app, "upload", b"u").await;
    upload(&app, "view-files", b"v").await;
    assert_eq!(
        list(&app).await,
        vec!["upload".to_string(), "view-files".to_string()]
    );

    for uri in ["/files/upload", "/files/view-files"] {
        let response = app.clone().oneshot(delete(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(
            body_to_string(response.into_body()).await,
            "File is deleted successfully"
        );
    }

    assert_eq!(list(&app).await, Vec::<String>::new());

    // The static routes keep serving their own methods
    upload(&app, "after.txt", b"a").await;
    assert_eq!(list(&app).await, vec!["after.txt".to_string()]);
}

// ============================================================================
// Backend failures
// ============================================================================

/// Store whose backend is never reachable
struct UnreachableStore;

#[async_trait]
impl ObjectStore for UnreachableStore {
    fn bucket(&self) -> &str {
        "files"
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        Err(unreachable_backend())
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        Err(unreachable_backend())
    }

    async fn list_objects(&self) -> StorageResult<Vec<String>> {
        Err(unreachable_backend())
    }

    async fn get_object(&self, _key: &str) -> StorageResult<ObjectStream> {
        Err(unreachable_backend())
    }

    async fn put_object(
        &self,
        _key: &str,
        _upload: StagedUpload,
        _content_type: &str,
    ) -> StorageResult<()> {
        Err(unreachable_backend())
    }

    async fn delete_object(&self, _key: &str) -> StorageResult<()> {
        Err(unreachable_backend())
    }
}

fn unreachable_backend() -> StorageError {
    StorageError::BackendUnavailable("connection refused".to_string())
}

#[tokio::test]
async fn test_backend_outage_is_service_unavailable() {
    let app = create_router(AppState::new(Arc::new(UnreachableStore), Config::default()));

    let requests = vec![
        get("/files/view-files"),
        get("/files/view/a.txt"),
        get("/files/download/a.txt"),
        delete("/files/a.txt"),
        upload_request("a.txt", b"a"),
    ];

    for request in requests {
        let uri = request.uri().to_string();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_eq!(error_code(response).await, "BACKEND_UNAVAILABLE");
    }
}

/// Store that answers listings too slowly and serves objects that break
/// after the first chunk
struct FlakyStore;

#[async_trait]
impl ObjectStore for FlakyStore {
    fn bucket(&self) -> &str {
        "files"
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        Ok(true)
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn list_objects(&self) -> StorageResult<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(vec!["late.txt".to_string()])
    }

    async fn get_object(&self, _key: &str) -> StorageResult<ObjectStream> {
        let chunks = vec![
            Ok(Bytes::from_static(b"first chunk")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        ];
        Ok(ObjectStream {
            content_type: Some("text/plain".to_string()),
            content_length: None,
            body: stream::iter(chunks).boxed(),
        })
    }

    async fn put_object(
        &self,
        _key: &str,
        _upload: StagedUpload,
        _content_type: &str,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn delete_object(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_backend_times_out_with_error_body() {
    let mut config = Config::default();
    config.server.request_timeout_seconds = 1;
    let app = create_router(AppState::new(Arc::new(FlakyStore), config));

    let response = app.oneshot(get("/files/view-files")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(error_code(response).await, "TIMEOUT");
}

#[tokio::test]
async fn test_stream_failure_after_headers_truncates_body() {
    let app = create_router(AppState::new(Arc::new(FlakyStore), Config::default()));

    for uri in ["/files/view/broken.txt", "/files/download/broken.txt"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert!(response.into_body().collect().await.is_err(), "{uri}");
    }
}

#[tokio::test]
async fn test_startup_fails_without_backend() {
    assert!(ensure_bucket(&UnreachableStore).await.is_err());
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&body_bytes(response.into_body()).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["bucket"], "files");
}
