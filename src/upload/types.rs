//! Upload kinds and outcomes

use std::str::FromStr;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::backend::{BackendResponse, JobReference, JobStatus};
use crate::error::GatewayError;

/// Multipart field the backend reads uploaded artifacts from
pub const UPLOAD_FIELD: &str = "upload[droplet]";

/// What is being uploaded; decides the backend endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Staged application droplet, completed by an asynchronous backend job
    Droplet,
    /// Buildpack cache, usually accepted synchronously
    BuildArtifacts,
}

impl UploadKind {
    /// Backend path (relative to the base URL) that receives this upload
    pub fn backend_path(&self, guid: &str) -> String {
        match self {
            Self::Droplet => format!("staging/droplets/{}/upload?async=true", guid),
            Self::BuildArtifacts => format!("staging/buildpack_cache/{}/upload", guid),
        }
    }

    pub fn filename(&self) -> &'static str {
        match self {
            Self::Droplet => "droplet.tgz",
            Self::BuildArtifacts => "buildpack_cache.tgz",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Droplet => "droplet",
            Self::BuildArtifacts => "build_artifacts",
        }
    }
}

impl FromStr for UploadKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "droplet" => Ok(Self::Droplet),
            "build_artifacts" => Ok(Self::BuildArtifacts),
            other => Err(GatewayError::BadRequest(format!(
                "unknown upload kind '{}'",
                other
            ))),
        }
    }
}

/// Successful end of an upload sequence. Failures are `GatewayError`s.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    /// Backend accepted synchronously; its answer goes back unchanged
    Passthrough(BackendResponse),

    /// Backend job reached `FINISHED`
    JobFinished { job: JobReference, status: JobStatus },
}

impl IntoResponse for UploadOutcome {
    fn into_response(self) -> Response {
        match self {
            UploadOutcome::Passthrough(backend) => {
                let mut response = (backend.status, backend.body).into_response();
                match backend.content_type {
                    Some(content_type) => {
                        response
                            .headers_mut()
                            .insert(header::CONTENT_TYPE, content_type);
                    }
                    None => {
                        response.headers_mut().remove(header::CONTENT_TYPE);
                    }
                }
                response
            }
            UploadOutcome::JobFinished { .. } => StatusCode::CREATED.into_response(),
        }
    }
}
