use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::checksum::{file_name, ChecksumRecord};
use super::range::{self, RangeOutcome};
use crate::error::{GatewayError, Result};

/// Serves artifacts from a read-only root directory
#[derive(Debug, Clone)]
pub struct StaticArtifactServer {
    root: PathBuf,
}

impl StaticArtifactServer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve `request_path` (relative to the root) honouring conditional and range headers
    pub async fn serve(&self, request_path: &str, headers: &HeaderMap) -> Result<Response> {
        if contains_dot_dot(request_path) {
            return Err(GatewayError::BadRequest("invalid URL path".to_string()));
        }

        let path = self.resolve(request_path);
        let display = file_name(&path);

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|_| GatewayError::NotFound(format!("File not found: {}", display)))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| GatewayError::Internal(format!("Cannot stat file {}: {}", display, e)))?;
        if metadata.is_dir() {
            return Err(GatewayError::Forbidden(
                "Unauthorized to list the directory".to_string(),
            ));
        }

        let checksum = ChecksumRecord::load(&path).await?;
        let etag = checksum.etag();
        let etag_value = HeaderValue::from_str(&etag)
            .map_err(|_| GatewayError::Internal(format!("Unusable checksum for {}", display)))?;

        if headers
            .get(header::IF_NONE_MATCH)
            .is_some_and(|value| value.as_bytes() == etag.as_bytes())
        {
            tracing::debug!(path = %request_path, etag = %etag, "Artifact not modified");
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag_value)
                .body(Body::empty())
                .map_err(|e| GatewayError::Internal(e.to_string()));
        }

        let size = metadata.len();
        let modified: Option<DateTime<Utc>> = metadata.modified().ok().map(DateTime::from);
        let content_type = mime_guess::from_path(&path).first_or_octet_stream();

        let mut builder = Response::builder()
            .header(header::ETAG, etag_value)
            .header(header::ACCEPT_RANGES, "bytes");
        if let Some(modified) = modified {
            builder = builder.header(header::LAST_MODIFIED, range::http_date(modified));
        }

        let outcome = range::evaluate(
            header_str(headers, header::RANGE),
            header_str(headers, header::IF_RANGE),
            &etag,
            modified,
            size,
        );

        let response = match outcome {
            RangeOutcome::Full => builder
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type.as_ref())
                .header(header::CONTENT_LENGTH, size)
                .body(Body::from_stream(ReaderStream::new(file))),
            RangeOutcome::Partial(byte_range) => {
                file.seek(SeekFrom::Start(byte_range.start)).await?;
                let reader = file.take(byte_range.len());
                builder
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(header::CONTENT_TYPE, content_type.as_ref())
                    .header(header::CONTENT_LENGTH, byte_range.len())
                    .header(header::CONTENT_RANGE, byte_range.content_range(size))
                    .body(Body::from_stream(ReaderStream::new(reader)))
            }
            RangeOutcome::Unsatisfiable => builder
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", size))
                .body(Body::empty()),
        };

        tracing::debug!(path = %request_path, size, etag = %etag, "Serving artifact");

        response.map_err(|e| GatewayError::Internal(e.to_string()))
    }

    /// Join the cleaned request path onto the root. Empty and `.` segments are dropped.
    fn resolve(&self, request_path: &str) -> PathBuf {
        request_path
            .split(is_separator)
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

/// True when any `/` or `\` separated segment is exactly `..`.
///
/// This is a textual check; names such as `test2..` are fine.
pub fn contains_dot_dot(path: &str) -> bool {
    if !path.contains("..") {
        return false;
    }
    path.split(is_separator).any(|segment| segment == "..")
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
