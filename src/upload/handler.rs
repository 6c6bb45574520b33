//! Upload orchestration
//!
//! Validates the inbound request, relays it, and follows the backend job if
//! one was started. The sequence runs as its own task tied to a
//! `CancellationToken`; the handler future holds the token's drop guard, so
//! when the client disconnects and the handler future is dropped, the task
//! stops at its next suspension point and releases the inbound body and any
//! backend connection it holds.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use futures::TryStreamExt;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use super::types::{UploadKind, UploadOutcome, UPLOAD_FIELD};
use crate::backend::{PollError, Poller, UploadRequest, Uploader};
use crate::error::{GatewayError, Result};

#[derive(Clone)]
pub struct UploadHandler {
    uploader: Arc<dyn Uploader>,
    poller: Arc<dyn Poller>,
    base_url: Url,
}

impl UploadHandler {
    pub fn new(base_url: Url, uploader: Arc<dyn Uploader>, poller: Arc<dyn Poller>) -> Self {
        Self {
            uploader,
            poller,
            base_url: directory_url(base_url),
        }
    }

    /// Handle one upload end to end
    pub async fn handle(
        &self,
        kind: UploadKind,
        guid: &str,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<UploadOutcome> {
        let request = self.prepare(kind, guid, headers, body)?;

        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();

        let sequence = tokio::spawn(run_sequence(
            self.uploader.clone(),
            self.poller.clone(),
            request,
            cancel,
        ));

        sequence
            .await
            .map_err(|e| GatewayError::Internal(format!("upload task failed: {}", e)))?
    }

    fn prepare(
        &self,
        kind: UploadKind,
        guid: &str,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<UploadRequest> {
        if guid.trim().is_empty() || guid.contains(|c: char| matches!(c, '/' | '\\' | '?' | '#')) {
            return Err(GatewayError::BadRequest(format!("invalid guid '{}'", guid)));
        }

        let content_length = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| GatewayError::BadRequest("missing Content-Length".to_string()))?;

        let destination = self
            .base_url
            .join(&kind.backend_path(guid))
            .map_err(|e| GatewayError::BadRequest(format!("cannot build upload URL: {}", e)))?;

        let body = body
            .into_data_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(UploadRequest {
            destination,
            field_name: UPLOAD_FIELD,
            filename: kind.filename().to_string(),
            content_length,
            body: Box::pin(body),
        })
    }
}

async fn run_sequence(
    uploader: Arc<dyn Uploader>,
    poller: Arc<dyn Poller>,
    request: UploadRequest,
    cancel: CancellationToken,
) -> Result<UploadOutcome> {
    let destination = request.destination.clone();

    let relayed = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!(destination = %destination, "Upload cancelled while relaying");
            return Err(GatewayError::Cancelled);
        }
        result = uploader.upload(request) => result,
    };
    let relayed = relayed.map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

    let Some(job) = relayed.job else {
        let response = relayed.response;
        if response.status.is_success() {
            return Ok(UploadOutcome::Passthrough(response));
        }
        return Err(GatewayError::UpstreamRejected {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
        });
    };

    tracing::info!(destination = %destination, job = %job, "Upload accepted, following job");

    match poller.poll_until_terminal(&job, &cancel).await {
        Ok(status) => Ok(UploadOutcome::JobFinished { job, status }),
        Err(PollError::Failed(detail)) => Err(GatewayError::JobFailed(detail)),
        Err(PollError::TimedOut(timeout)) => Err(GatewayError::JobTimedOut(timeout)),
        Err(err @ PollError::Unavailable { .. }) => {
            Err(GatewayError::UpstreamUnavailable(err.to_string()))
        }
        Err(PollError::Protocol(reason)) => Err(GatewayError::ProtocolError(reason)),
        Err(PollError::Cancelled) => Err(GatewayError::Cancelled),
    }
}

/// Make sure relative joins append to the base path instead of replacing its last segment
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
