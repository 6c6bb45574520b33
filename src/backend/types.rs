//! Backend wire types and relay/poll results

use std::fmt;
use std::pin::Pin;

use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use futures::Stream;
use reqwest::Url;
use serde::Deserialize;

/// Upload body as it arrives from the client
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

// ============================================================================
// Upload Types
// ============================================================================

/// One upload to forward. Owned by the handler for the life of the request.
pub struct UploadRequest {
    /// Full backend URL the upload is posted to
    pub destination: Url,

    /// Multipart field carrying the file
    pub field_name: &'static str,

    /// File name announced in the multipart part
    pub filename: String,

    /// Declared length of `body`, forwarded unchanged
    pub content_length: u64,

    pub body: ByteStream,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("destination", &self.destination.as_str())
            .field("field_name", &self.field_name)
            .field("filename", &self.filename)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Backend's immediate answer to an upload, fully read
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// What the relay hands back: the immediate response and, if the backend
/// went asynchronous, where to follow the job.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub response: BackendResponse,
    pub job: Option<JobReference>,
}

// ============================================================================
// Job Types
// ============================================================================

/// Opaque location of an asynchronous backend job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReference {
    location: Url,
}

impl JobReference {
    pub fn new(location: Url) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &Url {
        &self.location
    }
}

impl fmt::Display for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.location.as_str())
    }
}

/// Job lifecycle state. `QUEUED -> RUNNING -> {FINISHED | FAILED}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Failed,
    /// Anything else the backend sent; never polled past
    Unrecognized(String),
}

impl JobState {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Position in the lifecycle; a job never moves to a lower stage
    pub fn stage(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Finished | Self::Failed => 2,
            Self::Unrecognized(_) => u8::MAX,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("QUEUED"),
            Self::Running => f.write_str("RUNNING"),
            Self::Finished => f.write_str("FINISHED"),
            Self::Failed => f.write_str("FAILED"),
            Self::Unrecognized(raw) => write!(f, "unrecognized({})", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub detail: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self { state, detail: None }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            detail: Some(detail.into()),
        }
    }
}

// ============================================================================
// Job Document (wire format)
// ============================================================================

/// Job resource as returned by the backend, both when an upload is accepted
/// and on every status query:
///
/// ```json
/// {"metadata": {"guid": "...", "url": "/v2/jobs/..."},
///  "entity": {"status": "failed", "error_details": {"description": "..."}}}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct JobDocument {
    #[serde(default)]
    pub metadata: JobMetadata,
    pub entity: JobEntity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobEntity {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_details: Option<JobErrorDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobErrorDetails {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl JobDocument {
    pub fn status(&self) -> JobStatus {
        let detail = self.entity.error.clone().or_else(|| {
            self.entity.error_details.as_ref().and_then(|details| {
                details
                    .description
                    .clone()
                    .or_else(|| details.error_code.clone())
            })
        });

        JobStatus {
            state: JobState::from_wire(&self.entity.status),
            detail,
        }
    }
}
