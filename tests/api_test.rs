mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::{MockRasterizer, MockStorageService, TestRoots, dir_is_empty, init_tracing};
use http_body_util::BodyExt;
use pdf_image_pipeline::config::WorkspaceScope;
use pdf_image_pipeline::{AppState, create_app};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const BOUNDARY: &str = "----pipeline-test-boundary";

fn setup_app(roots: &TestRoots) -> Router {
    init_tracing();
    let state = AppState::new(
        roots.config(WorkspaceScope::PerJob),
        Arc::new(MockStorageService::new()),
        Arc::new(MockRasterizer::new()),
    );
    create_app(state)
}

fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn upload_request(files: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload-files/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

/// Polls the upload status until the job leaves `processing`.
async fn wait_for_upload(app: &Router, task_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, get(&format!("/s3-upload-status/{}", task_id))).await;
        if status == StatusCode::OK && body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish in time", task_id);
}

#[tokio::test]
async fn test_health() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "connected");
    assert_eq!(body["tracked_jobs"], 0);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

/// Collects the `request_id` field of every span opened while installed.
#[derive(Clone, Default)]
struct SpanRequestIds(Arc<Mutex<Vec<String>>>);

struct RequestIdField(Option<String>);

impl Visit for RequestIdField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "request_id" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for SpanRequestIds {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut field = RequestIdField(None);
        attrs.record(&mut field);
        if let Some(request_id) = field.0 {
            self.0.lock().unwrap().push(request_id);
        }
    }
}

#[tokio::test]
async fn test_request_span_carries_generated_request_id() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let spans = SpanRequestIds::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(spans.clone()));

    let response = app.oneshot(get("/health")).await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());

    let recorded = spans.0.lock().unwrap().clone();
    assert_eq!(recorded, vec![generated]);
}

#[tokio::test]
async fn test_upload_preserves_relative_paths() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let (status, body) = send(
        &app,
        upload_request(&[
            ("batch/a.pdf", b"pages=1"),
            ("batch/sub/b.pdf", b"pages=2"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filenames"][0], "batch/a.pdf");
    assert!(roots.intake.path().join("batch/a.pdf").exists());
    assert!(roots.intake.path().join("batch/sub/b.pdf").exists());
}

#[tokio::test]
async fn test_upload_rejects_directory_traversal() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let (status, body) = send(&app, upload_request(&[("../../escape.pdf", b"pages=1")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Parent directory"));
    assert!(dir_is_empty(roots.intake.path()).await);
}

#[tokio::test]
async fn test_convert_missing_folder_is_404() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let (status, body) = send(&app, post("/convert-pdfs/?folder_path=missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_convert_without_pdfs_reports_nothing_to_do() {
    let roots = TestRoots::new();
    roots.add_file("batch/readme.txt").await;
    let app = setup_app(&roots);

    let (status, body) = send(&app, post("/convert-pdfs/?folder_path=batch")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No PDF files found to convert");
    assert!(body.get("task_id").is_none());
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);
    let unknown = uuid::Uuid::new_v4();

    let (status, body) = send(&app, get(&format!("/conversion-status/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task not found");

    let (status, _) = send(&app, get(&format!("/s3-upload-status/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/conversion-status/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_full_api_flow() {
    let roots = TestRoots::new();
    let app = setup_app(&roots);

    let (status, _) = send(
        &app,
        upload_request(&[
            ("scans/one.pdf", b"pages=2"),
            ("scans/deep/two.pdf", b"pages=1"),
            ("scans/bad_corrupt.pdf", b"pages=5"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post("/convert-pdfs/?folder_path=scans")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_files"], 3);
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let upload = wait_for_upload(&app, &task_id).await;
    assert_eq!(upload["status"], "completed");
    assert_eq!(upload["total"], 3);
    assert_eq!(upload["uploaded"], 3);
    assert_eq!(upload["failed"], 0);

    let (status, conversion) =
        send(&app, get(&format!("/conversion-status/{}", task_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversion["status"], "completed");
    assert_eq!(conversion["total"], 3);
    assert_eq!(conversion["converted"], 2);
    assert_eq!(conversion["failed"], 1);

    // Cleanup runs right after the upload record completes
    for _ in 0..200 {
        if dir_is_empty(roots.intake.path()).await && dir_is_empty(roots.staging.path()).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("working directories were not purged");
}
