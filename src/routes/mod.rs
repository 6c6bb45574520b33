//! Route modules for the artifact gateway

pub mod files;
pub mod health;
pub mod upload;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .merge(files::router())
        .nest("/v1/upload", upload::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
