//! Static artifact routes
//!
//! Serves checksum-verified artifacts from the static root. The root itself
//! is a directory and is answered like any other directory.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};

use crate::error::Result;
use crate::state::AppState;

/// Create the static files router, mounted at `/v1/static`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/static", get(serve_root))
        .route("/v1/static/", get(serve_root))
        .route("/v1/static/*path", get(serve_file))
}

/// GET /v1/static/*path
async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    state.static_server().serve(&path, &headers).await
}

/// GET /v1/static
async fn serve_root(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    state.static_server().serve("", &headers).await
}
