//! Common test utilities for E2E testing with mocks.
//!
//! Builds the full router in-process with a [`MockConversionService`]
//! behind every converter, so requests exercise the real handlers and
//! orchestrators without a remote service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use transmute_core::{load_config_from_str, testing::MockConversionService, ConversionService};
use transmute_server::{api::create_router, build_state, state::AppState};

/// Base URL the test config points the service at.
pub const SERVICE_URL: &str = "http://converter.test";

/// Video disabled; audio and pdf_protect tuned for fast polling.
pub const TEST_CONFIG: &str = r#"
[service]
base_url = "http://converter.test"
api_key = "secret-key"

[converters.video]
enabled = false

[converters.audio]
max_size_bytes = 1024
poll_interval_ms = 10
initial_delay_ms = 10
max_attempts = 50

[converters.pdf_protect]
poll_interval_ms = 10
initial_delay_ms = 10
max_attempts = 50
"#;

const BOUNDARY: &str = "transmute-test-boundary";

/// Test fixture for E2E testing with a mock conversion service.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    /// Mock service - script submissions, polls and downloads
    pub service: Arc<MockConversionService>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Vec<u8>,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TEST_CONFIG).await
    }

    pub async fn with_config(toml: &str) -> Self {
        let config = load_config_from_str(toml).expect("test config parses");
        let service = Arc::new(MockConversionService::new());
        let state = build_state(
            config,
            Arc::clone(&service) as Arc<dyn ConversionService>,
        )
        .expect("state builds");
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            service,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// Upload files as `file` parts of one multipart request.
    pub async fn upload(&self, kind: &str, files: &[(&str, usize)]) -> TestResponse {
        let mut body = Vec::new();
        for (name, size) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend(std::iter::repeat(b'x').take(*size));
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(format!("/api/v1/converters/{kind}/files"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Upload one file and return its id.
    pub async fn upload_one(&self, kind: &str, name: &str, size: usize) -> String {
        let response = self.upload(kind, &[(name, size)]).await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["accepted"][0]["id"]
            .as_str()
            .expect("accepted file has an id")
            .to_string()
    }

    /// Poll the file projection until it reaches `status`.
    pub async fn wait_for_status(&self, kind: &str, id: &str, status: &str) -> Value {
        let path = format!("/api/v1/converters/{kind}/files/{id}");
        for _ in 0..200 {
            let response = self.get(&path).await;
            if response.body["status"] == status {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("file {} never reached status {}", id, status);
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let raw = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body = if raw.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            raw,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
