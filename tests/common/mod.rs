//! Common test utilities: a scripted fake backend and gateway builders.
//!
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use reqwest::Url;
use tempfile::TempDir;
use tower::ServiceExt;

use artifact_gateway::config::{Config, JobConfig};
use artifact_gateway::routes;
use artifact_gateway::state::AppState;

pub const JOB_PATH: &str = "/v2/jobs/job-guid";

/// How the fake backend answers an upload
#[derive(Debug, Clone)]
pub enum UploadReply {
    /// 202 with a `Location` header naming the job
    AcceptedWithLocation,
    /// 201 with a job document body and no `Location`
    AcceptedWithDocument,
    /// Any other answer, returned verbatim
    Immediate(u16, &'static str),
    /// A synchronous answer that also points at the stored resource
    ImmediateWithLocation(u16, &'static str, &'static str),
}

/// One answer to a job status query
#[derive(Debug, Clone)]
pub enum JobReply {
    State(&'static str),
    Failed(&'static str),
    Status(u16),
}

/// What the backend saw for one upload
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub path: String,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl RecordedUpload {
    pub fn body_contains(&self, needle: &[u8]) -> bool {
        self.body
            .windows(needle.len())
            .any(|window| window == needle)
    }
}

struct Inner {
    upload_reply: Mutex<UploadReply>,
    script: Mutex<VecDeque<JobReply>>,
    last_reply: Mutex<JobReply>,
    uploads: Mutex<Vec<RecordedUpload>>,
    job_queries: Mutex<Vec<Instant>>,
}

/// In-process backend speaking the staging/job protocol
#[derive(Clone)]
pub struct FakeBackend {
    inner: Arc<Inner>,
    pub base_url: Url,
}

impl FakeBackend {
    /// Start on an ephemeral port. The last scripted job reply repeats once
    /// the script is exhausted.
    pub async fn start(upload_reply: UploadReply, script: Vec<JobReply>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or(JobReply::State("running"));
        let inner = Arc::new(Inner {
            upload_reply: Mutex::new(upload_reply),
            script: Mutex::new(script.into()),
            last_reply: Mutex::new(last),
            uploads: Mutex::new(Vec::new()),
            job_queries: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/staging/droplets/:guid/upload", post(accept_upload))
            .route("/staging/buildpack_cache/:guid/upload", post(accept_upload))
            .route("/v2/jobs/:guid", get(job_status))
            .with_state(inner.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake backend");
        });

        Self {
            inner,
            base_url: Url::parse(&format!("http://{}/", addr)).expect("backend url"),
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.inner.uploads.lock().unwrap().clone()
    }

    pub fn job_queries(&self) -> Vec<Instant> {
        self.inner.job_queries.lock().unwrap().clone()
    }
}

async fn accept_upload(
    State(inner): State<Arc<Inner>>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let header_str = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let content_length = header_str(header::CONTENT_LENGTH).and_then(|value| value.parse().ok());
    let content_type = header_str(header::CONTENT_TYPE);
    let authorization = header_str(header::AUTHORIZATION);
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    inner.uploads.lock().unwrap().push(RecordedUpload {
        path: parts.uri.path().to_string(),
        content_length,
        content_type,
        authorization,
        body,
    });

    let reply = inner.upload_reply.lock().unwrap().clone();
    match reply {
        UploadReply::AcceptedWithLocation => {
            let mut headers = HeaderMap::new();
            headers.insert(header::LOCATION, JOB_PATH.parse().unwrap());
            (StatusCode::ACCEPTED, headers, job_document("queued", None)).into_response()
        }
        UploadReply::AcceptedWithDocument => {
            (StatusCode::CREATED, job_document("queued", None)).into_response()
        }
        UploadReply::Immediate(status, body) => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        UploadReply::ImmediateWithLocation(status, location, body) => {
            let status = StatusCode::from_u16(status).unwrap();
            let headers = [
                (header::CONTENT_TYPE, "application/json"),
                (header::LOCATION, location),
            ];
            (status, headers, body).into_response()
        }
    }
}

async fn job_status(State(inner): State<Arc<Inner>>) -> Response {
    inner.job_queries.lock().unwrap().push(Instant::now());

    let reply = {
        let mut script = inner.script.lock().unwrap();
        script
            .pop_front()
            .unwrap_or_else(|| inner.last_reply.lock().unwrap().clone())
    };

    match reply {
        JobReply::State(state) => (StatusCode::OK, job_document(state, None)).into_response(),
        JobReply::Failed(detail) => {
            (StatusCode::OK, job_document("failed", Some(detail))).into_response()
        }
        JobReply::Status(status) => StatusCode::from_u16(status).unwrap().into_response(),
    }
}

fn job_document(state: &str, description: Option<&str>) -> String {
    serde_json::json!({
        "metadata": {"guid": "job-guid", "url": JOB_PATH},
        "entity": {
            "status": state,
            "error_details": description.map(|d| serde_json::json!({"description": d})),
        }
    })
    .to_string()
}

/// Gateway configuration pointing at `backend`, with fast polling
pub fn gateway_config(static_root: &Path, backend: &Url) -> Config {
    let mut config = Config::default();
    config.static_files.root = static_root.to_path_buf();
    config.backend.base_url = backend.clone();
    config.jobs = JobConfig {
        poll_interval: Duration::from_millis(50),
        timeout: Duration::from_secs(5),
        max_query_retries: 3,
    };
    config.communication_timeout = Duration::from_secs(5);
    config
}

pub fn gateway(config: Config) -> Router {
    routes::app(AppState::from_config(config).expect("gateway state"))
}

/// Static root populated with the standard artifact fixtures
pub fn static_fixtures() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    std::fs::write(root.join("test"), "some-content").unwrap();
    std::fs::write(root.join("test.sha1"), "some-hash\n").unwrap();
    std::fs::write(root.join("no-sha"), "orphan").unwrap();
    std::fs::write(root.join("empty-sha"), "content").unwrap();
    std::fs::write(root.join("empty-sha.sha1"), "  \n").unwrap();
    std::fs::create_dir(root.join("testdir")).unwrap();
    std::fs::write(root.join("testdir").join("nested"), "nested").unwrap();
    std::fs::write(root.join("testdir").join("nested.sha1"), "nested-hash").unwrap();
    dir
}

/// Send one request through the router and collect the body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let (parts, body) = response.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("response body");
    (parts.status, parts.headers, body)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn upload_request(uri: &str, payload: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap()
}
