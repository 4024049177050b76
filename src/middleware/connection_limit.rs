//! Connection limit middleware for WebSocket connections
//!
//! This module provides middleware to enforce connection limits:
//! - Global maximum WebSocket connections
//! - Per-IP connection limits
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use live_bridge::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/live", get(live_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Address of a client holding a session slot. The live handler releases the
/// slot when the socket closes.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Enforce session limits on WebSocket upgrades.
///
/// Rejects with 503 when the server is at its global limit and 429 when the
/// caller's address is at its per-IP limit. Plain HTTP requests such as
/// health checks pass through untouched. A slot taken for a request that is
/// not answered with `101 Switching Protocols` is released here.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let client_ip = addr.ip();
    let rejection = match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            let response = next.run(request).await;
            // Only a switched connection reaches the live handler, which then
            // owns the slot.
            if response.status() != StatusCode::SWITCHING_PROTOCOLS {
                tracing::debug!(
                    ip = %client_ip,
                    status = %response.status(),
                    "Upgrade did not complete, releasing slot"
                );
                state.release_connection(client_ip);
            }
            return response;
        }
        Err(ConnectionLimitError::GlobalLimitReached) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Server at capacity. Please try again later.",
        ),
        Err(ConnectionLimitError::PerIpLimitReached) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many sessions from your IP address.",
        ),
    };

    tracing::warn!(
        ip = %client_ip,
        active = state.ws_connection_count(),
        status = %rejection.0,
        "Rejecting live session"
    );
    rejection.into_response()
}
