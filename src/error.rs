//! Error types for the artifact gateway

use axum::{
    body::Bytes,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Every way a gateway request can end other than success
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Directory access. Answered with 401, which existing clients expect.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Backend rejected upload with status {status}")]
    UpstreamRejected {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    #[error("Backend unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Backend job failed: {0}")]
    JobFailed(String),

    #[error("Backend job did not finish within {0:?}")]
    JobTimedOut(std::time::Duration),

    #[error("Backend protocol error: {0}")]
    ProtocolError(String),

    #[error("Request cancelled by client")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// HTTP status this error is answered with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::JobFailed(_) => StatusCode::BAD_GATEWAY,
            Self::JobTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ProtocolError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "unauthorized",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::JobFailed(_) => "job_failed",
            Self::JobTimedOut(_) => "job_timed_out",
            Self::ProtocolError(_) => "protocol_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) | Self::Io(_) => "internal_error",
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            GatewayError::BadRequest(msg)
            | GatewayError::NotFound(msg)
            | GatewayError::Forbidden(msg) => {
                tracing::debug!(status = %status, "{}", msg);
                msg.clone()
            }
            GatewayError::UpstreamRejected {
                status,
                content_type,
                body,
            } => {
                tracing::warn!(status = %status, "Passing through backend rejection");
                let mut response = (*status, body.clone()).into_response();
                if let Some(content_type) = content_type {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, content_type.clone());
                }
                return response;
            }
            GatewayError::JobFailed(detail) => {
                tracing::warn!("Backend job failed: {}", detail);
                detail.clone()
            }
            GatewayError::Cancelled => {
                tracing::info!("Client went away before the upload completed");
                self.to_string()
            }
            GatewayError::Internal(_) | GatewayError::Io(_) => {
                tracing::error!("{}", self);
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::error!("{}", self);
                self.to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: self.error_type().to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
