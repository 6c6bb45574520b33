//! Upload routes
//!
//! Endpoints:
//! - POST /v1/upload/droplet/:guid - relay a droplet, wait for the backend job
//! - POST /v1/upload/build_artifacts/:guid - relay a buildpack cache

use axum::{
    body::Body,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Router,
};

use crate::error::Result;
use crate::state::AppState;
use crate::upload::{UploadKind, UploadOutcome};

/// Create the upload router
pub fn router() -> Router<AppState> {
    Router::new().route("/:kind/:guid", post(upload))
}

/// POST /v1/upload/:kind/:guid
///
/// The body is streamed through; it is never collected here.
async fn upload(
    State(state): State<AppState>,
    Path((kind, guid)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<UploadOutcome> {
    let kind: UploadKind = kind.parse()?;

    tracing::info!(kind = kind.as_str(), guid = %guid, "Upload received");

    state
        .upload_handler()
        .handle(kind, &guid, &headers, body)
        .await
}
