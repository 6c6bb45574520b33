//! Upload relay
//!
//! Re-frames an inbound upload body as a single multipart part and streams
//! it to the backend. The body is pumped through a small bounded channel, so
//! at most a few chunks are held in memory at any time and the declared
//! length is carried through to the outbound `Content-Length`.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tokio::sync::mpsc;

use super::client::Credentials;
use super::types::{BackendResponse, JobDocument, JobReference, RelayResponse, UploadRequest};

/// Chunks buffered between the inbound body and the outbound request
const PUMP_DEPTH: usize = 4;

/// Transport-level relay failures. A backend that answers, whatever the
/// status, is not a relay error.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to build upload request: {0}")]
    Request(String),

    #[error("backend did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("backend transport failure: {0}")]
    Transport(String),
}

/// Forwards an upload and reports the backend's immediate outcome
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<RelayResponse, RelayError>;
}

/// `Uploader` backed by the shared reqwest client
#[derive(Debug, Clone)]
pub struct Relay {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: Url,
    timeout: Duration,
}

impl Relay {
    pub fn new(
        client: reqwest::Client,
        credentials: Credentials,
        base_url: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            credentials,
            base_url,
            timeout,
        }
    }

    fn classify(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::TimedOut(self.timeout)
        } else {
            RelayError::Transport(err.to_string())
        }
    }

    /// Only 2xx answers carry jobs. `Location` names a job on 202 alone; on
    /// any other 2xx it is the stored resource, and only a job document body counts.
    fn job_reference(
        &self,
        status: StatusCode,
        location: Option<&str>,
        body: &[u8],
    ) -> Option<JobReference> {
        if !status.is_success() {
            return None;
        }

        let raw = match location {
            Some(location) if status == StatusCode::ACCEPTED => location.to_string(),
            _ => serde_json::from_slice::<JobDocument>(body)
                .ok()
                .and_then(|document| document.metadata.url)?,
        };

        match self.base_url.join(&raw) {
            Ok(url) => Some(JobReference::new(url)),
            Err(e) => {
                tracing::warn!(location = %raw, error = %e, "Ignoring unparseable job location");
                None
            }
        }
    }
}

#[async_trait]
impl Uploader for Relay {
    async fn upload(&self, request: UploadRequest) -> Result<RelayResponse, RelayError> {
        let UploadRequest {
            destination,
            field_name,
            filename,
            content_length,
            mut body,
        } = request;

        let (tx, mut rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(PUMP_DEPTH);
        let pump = async move {
            while let Some(chunk) = body.next().await {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        };
        let outbound = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(outbound), content_length)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| RelayError::Request(e.to_string()))?;
        let form = Form::new().part(field_name, part);

        tracing::info!(
            destination = %destination,
            content_length,
            "Relaying upload to backend"
        );

        let send = self
            .credentials
            .apply(self.client.post(destination.clone()))
            .timeout(self.timeout)
            .multipart(form)
            .send();

        tokio::pin!(pump);
        tokio::pin!(send);
        let mut pumping = true;
        let result = loop {
            tokio::select! {
                result = &mut send => break result,
                _ = &mut pump, if pumping => pumping = false,
            }
        };

        let response = result.map_err(|e| self.classify(e))?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| HeaderValue::from_bytes(value.as_bytes()).ok());
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        let job = self.job_reference(status, location.as_deref(), &body);

        tracing::info!(
            destination = %destination,
            status = %status,
            job = ?job.as_ref().map(|j| j.to_string()),
            "Backend answered upload"
        );

        Ok(RelayResponse {
            response: BackendResponse {
                status,
                content_type,
                body,
            },
            job,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> Relay {
        Relay::new(
            reqwest::Client::new(),
            Credentials {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
            Url::parse("http://backend.example:9022/").unwrap(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_location_header_is_resolved_against_base() {
        let job = relay()
            .job_reference(StatusCode::ACCEPTED, Some("/v2/jobs/abc"), b"")
            .unwrap();
        assert_eq!(
            job.location().as_str(),
            "http://backend.example:9022/v2/jobs/abc"
        );
    }

    #[test]
    fn test_job_document_body() {
        let body = br#"{"metadata":{"guid":"abc","url":"/v2/jobs/abc"},"entity":{"status":"queued"}}"#;
        let job = relay().job_reference(StatusCode::CREATED, None, body).unwrap();
        assert_eq!(job.location().path(), "/v2/jobs/abc");
    }

    #[test]
    fn test_absolute_location_is_kept() {
        let job = relay()
            .job_reference(
                StatusCode::ACCEPTED,
                Some("https://jobs.example/v2/jobs/abc"),
                b"",
            )
            .unwrap();
        assert_eq!(job.location().as_str(), "https://jobs.example/v2/jobs/abc");
    }

    #[test]
    fn test_no_job_without_indicator() {
        assert!(relay()
            .job_reference(StatusCode::CREATED, None, b"{}")
            .is_none());
        assert!(relay()
            .job_reference(StatusCode::OK, None, b"not json")
            .is_none());
    }

    #[test]
    fn test_created_location_is_not_a_job() {
        assert!(relay()
            .job_reference(
                StatusCode::CREATED,
                Some("/v2/buildpack_cache/app-guid"),
                br#"{"stored":true}"#,
            )
            .is_none());
    }

    #[test]
    fn test_created_with_job_document_ignores_location() {
        let body = br#"{"metadata":{"url":"/v2/jobs/abc"},"entity":{"status":"queued"}}"#;
        let job = relay()
            .job_reference(StatusCode::CREATED, Some("/v2/droplets/app-guid"), body)
            .unwrap();
        assert_eq!(job.location().path(), "/v2/jobs/abc");
    }

    #[test]
    fn test_no_job_on_rejection() {
        assert!(relay()
            .job_reference(StatusCode::BAD_REQUEST, Some("/v2/jobs/abc"), b"")
            .is_none());
    }
}
