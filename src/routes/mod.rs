pub mod api;
pub mod live;

use axum::{Router, middleware};
use http::{HeaderValue, Method, header::CONTENT_TYPE};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(Any),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            base
        }
    }
}

/// Assemble the full application router.
///
/// Layer order (outer to inner): security headers -> CORS -> connection
/// limit (WebSocket routes only) -> handler. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the connection
/// limit can see the peer address.
pub fn create_app(state: Arc<AppState>) -> Router {
    let live_routes = live::create_live_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());

    api::create_api_router()
        .merge(live_routes)
        .with_state(state)
        .layer(cors)
        .layer(security_headers)
}
