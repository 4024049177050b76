//! Live session WebSocket handler
//!
//! Adapts an axum WebSocket to the transport-neutral [`SessionBridge`]:
//! incoming messages become [`ClientFrame`]s and a writer task drains
//! [`ClientRoute`]s back onto the socket.
//!
//! [`SessionBridge`]: crate::core::bridge::SessionBridge

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::bridge::{ClientInbound, SessionOutcome};
use crate::core::codec::{ClientFrame, ClientRoute};
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Outbound buffer between the relays and the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Time the writer gets to flush queued frames after the session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Live session WebSocket handler
///
/// Upgrades the connection and runs one bridged model session on it.
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ip)| ip);
    debug!(ip = ?client_ip, "Live WebSocket upgrade requested");

    let failed_state = state.clone();
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_failed_upgrade(move |e| {
            warn!(error = %e, "Live WebSocket upgrade failed");
            if let Some(ClientIp(ip)) = client_ip {
                failed_state.release_connection(ip);
            }
        })
        .on_upgrade(move |socket| handle_live_socket(socket, state, client_ip))
}

async fn handle_live_socket(socket: WebSocket, state: Arc<AppState>, client_ip: Option<ClientIp>) {
    info!(ip = ?client_ip, "Live WebSocket connection established");

    let (mut sender, receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<ClientRoute>(CHANNEL_BUFFER_SIZE);

    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                ClientRoute::Outgoing(message) => match message.to_json() {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                ClientRoute::Close => {
                    debug!("Closing live WebSocket connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                warn!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let inbound: ClientInbound = Box::pin(receiver.map(|message| match message {
        Ok(Message::Text(text)) => ClientFrame::Text(text.as_str().to_owned()),
        Ok(Message::Binary(data)) => ClientFrame::Binary(data),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => ClientFrame::Control,
        Ok(Message::Close(_)) => ClientFrame::Close,
        Err(e) => {
            warn!("Live WebSocket error: {}", e);
            ClientFrame::Close
        }
    }));

    match state.bridge.run(inbound, message_tx).await {
        SessionOutcome::SetupFailed(e) => {
            info!(ip = ?client_ip, error = %e, "Live session did not start");
        }
        SessionOutcome::Completed {
            uplink, downlink, ..
        } => {
            debug!(ip = ?client_ip, ?uplink, ?downlink, "Live session completed");
        }
    }

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    if let Some(ClientIp(ip)) = client_ip {
        state.release_connection(ip);
    }

    info!(ip = ?client_ip, "Live WebSocket connection closed");
}
