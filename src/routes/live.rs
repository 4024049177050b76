//! Live session WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live session WebSocket router
///
/// # Endpoints
///
/// `GET /` and `GET /live` - WebSocket upgrade for a bridged model session
///
/// # Protocol
///
/// After the upgrade the client sends:
/// 1. `{"setup": {...}}` with generation options for the model
/// 2. `{"realtime_input": {"media_chunks": [...]}}` frames carrying base64
///    `audio/pcm` or `image/jpeg` data
///
/// Server responds with:
/// - `{"text": "..."}` for model text and tool call results
/// - `{"audio": "<base64>"}` for model speech
/// - `{"turn_complete": true}` and `{"interrupted": true}`
/// - `{"error": "..."}` when the session cannot start
///
/// # Example
///
/// ```json
/// // Client sends setup
/// {"setup": {"generation_config": {"response_modalities": ["AUDIO"]}}}
///
/// // Client streams microphone audio
/// {"realtime_input": {"media_chunks": [{"mime_type": "audio/pcm", "data": "AAAA"}]}}
///
/// // Server echoes a tool call batch
/// {"text": "[{\"name\":\"record_transaction\",\"response\":{\"result\":{...}},\"id\":\"c1\"}]"}
/// ```
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(live_handler))
        .route("/live", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
