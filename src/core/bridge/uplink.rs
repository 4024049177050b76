//! Client → model relay.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::{ClientInbound, RelayExit, SessionStats, SessionWriter};
use crate::core::codec::{ClientFrame, ClientMessage, RawMediaChunk, decode_client_message};
use crate::core::live::LiveError;

/// Forward client media to the model until the client leaves, the model
/// transport fails or the session is cancelled.
pub(crate) async fn run_uplink(
    mut inbound: ClientInbound,
    writer: SessionWriter,
    stats: Arc<SessionStats>,
    cancel: CancellationToken,
    session_id: String,
) -> RelayExit {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(session_id = %session_id, "Uplink cancelled");
                return RelayExit::Cancelled;
            }
            frame = inbound.next() => frame,
        };

        let text = match frame {
            Some(ClientFrame::Text(text)) => text,
            Some(ClientFrame::Binary(data)) => {
                debug!(session_id = %session_id, len = data.len(), "Ignoring binary client frame");
                continue;
            }
            Some(ClientFrame::Control) => continue,
            Some(ClientFrame::Close) | None => {
                info!(session_id = %session_id, "Client connection closed");
                return RelayExit::ClientClosed;
            }
        };

        match decode_client_message(&text) {
            Ok(ClientMessage::RealtimeInput(chunks)) => {
                if let Err(e) = forward_chunks(&chunks, &writer, &stats, &session_id).await {
                    error!(session_id = %session_id, error = %e, "Model transport failed, stopping uplink");
                    return RelayExit::ModelWriteFailed;
                }
            }
            Ok(ClientMessage::Setup(_)) => {
                warn!(session_id = %session_id, "Ignoring repeated setup frame");
                stats.frame_skipped();
            }
            Ok(ClientMessage::Unrecognized) => {
                warn!(session_id = %session_id, "Skipping unrecognized client message");
                stats.frame_skipped();
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Skipping malformed client frame");
                stats.frame_skipped();
            }
        }
    }
}

/// Forward every usable chunk of one frame, in order.
///
/// Bad chunks are dropped individually. Only a transport failure is returned.
async fn forward_chunks(
    chunks: &[RawMediaChunk],
    writer: &SessionWriter,
    stats: &SessionStats,
    session_id: &str,
) -> Result<(), LiveError> {
    for chunk in chunks {
        let media = match chunk.decode() {
            Ok(media) => media,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    mime_type = %chunk.mime_type,
                    error = %e,
                    "Dropping media chunk"
                );
                stats.chunk_dropped();
                continue;
            }
        };

        let kind = media.kind;
        let result = writer.lock().await.send_media(kind, media.data).await;
        match result {
            Ok(()) => stats.media_forwarded(),
            Err(e) if e.is_transport_failure() => return Err(e),
            Err(e) => {
                warn!(session_id = %session_id, media = %kind, error = %e, "Failed to forward media chunk");
                stats.chunk_dropped();
            }
        }
    }
    Ok(())
}
