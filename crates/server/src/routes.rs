use axum::{extract::DefaultBodyLimit, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::AppState;
use crate::{health, search};

/// Large enough for a maximum-size data URL plus the JSON envelope.
const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

pub fn build(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(search::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}
