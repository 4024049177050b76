use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::health;
use crate::state::AppState;
use std::sync::Arc;

/// Create the router for plain HTTP endpoints
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
}
