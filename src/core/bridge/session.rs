//! Session lifecycle: setup handshake, relay supervision and teardown.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::downlink::run_downlink;
use super::uplink::run_uplink;
use crate::core::codec::{ClientFrame, ClientOutgoing, ClientRoute, CodecError, decode_setup};
use crate::core::live::{LiveConfig, LiveConnector, LiveError, LiveSession, LiveSink};
use crate::core::tools::{ToolRegistry, extract_panic_message};

/// Frames read from the client, already stripped of transport details.
pub type ClientInbound = Pin<Box<dyn Stream<Item = ClientFrame> + Send>>;

/// Single-writer handle on the model sink, shared by both relays.
pub type SessionWriter = Arc<Mutex<Box<dyn LiveSink>>>;

/// Reasons a session ends before any relay starts.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Client closed before sending setup")]
    ClientClosedBeforeSetup,

    #[error(transparent)]
    InvalidSetup(#[from] CodecError),

    #[error("Failed to open live session: {0}")]
    Connect(#[from] LiveError),
}

/// Why a relay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayExit {
    ClientClosed,
    ModelClosed,
    ClientWriteFailed,
    ModelWriteFailed,
    TransportError(String),
    Cancelled,
    Panicked(String),
}

/// Per-session counters, updated by both relays.
#[derive(Debug, Default)]
pub struct SessionStats {
    media_forwarded: AtomicU64,
    chunks_dropped: AtomicU64,
    frames_skipped: AtomicU64,
    tool_calls: AtomicU64,
    content_frames: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub media_forwarded: u64,
    pub chunks_dropped: u64,
    pub frames_skipped: u64,
    pub tool_calls: u64,
    pub content_frames: u64,
}

impl SessionStats {
    pub(crate) fn media_forwarded(&self) {
        self.media_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn chunk_dropped(&self) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tool_calls(&self, count: usize) {
        self.tool_calls.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn content_frame(&self) {
        self.content_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            media_forwarded: self.media_forwarded.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            content_frames: self.content_frames.load(Ordering::Relaxed),
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// No model session was opened, or opening it failed
    SetupFailed(BridgeError),
    /// Both relays ran and have stopped
    Completed {
        uplink: RelayExit,
        downlink: RelayExit,
        stats: StatsSnapshot,
    },
}

/// Bridges one client connection to one live model session.
///
/// The connector, tool registry and system instruction are fixed at
/// construction and shared across sessions; each [`SessionBridge::run`] call
/// owns exactly one model session.
#[derive(Clone)]
pub struct SessionBridge {
    connector: Arc<dyn LiveConnector>,
    tools: Arc<ToolRegistry>,
    system_instruction: Option<String>,
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("provider", &self.connector.provider_name())
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl SessionBridge {
    pub fn new(
        connector: Arc<dyn LiveConnector>,
        tools: Arc<ToolRegistry>,
        system_instruction: Option<String>,
    ) -> Self {
        Self {
            connector,
            tools,
            system_instruction,
        }
    }

    /// Run a session to completion.
    ///
    /// Reads the setup frame, opens the model session, then relays in both
    /// directions until either side stops. The model session is always
    /// closed before this returns.
    pub async fn run(
        &self,
        mut inbound: ClientInbound,
        outbound: mpsc::Sender<ClientRoute>,
    ) -> SessionOutcome {
        let session_id = uuid::Uuid::new_v4().to_string();

        let options = match read_setup(&mut inbound).await {
            Ok(options) => options,
            Err(BridgeError::ClientClosedBeforeSetup) => {
                info!(session_id = %session_id, "Client closed before setup");
                return SessionOutcome::SetupFailed(BridgeError::ClientClosedBeforeSetup);
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Rejecting invalid setup frame");
                notify_error(&outbound, &e).await;
                return SessionOutcome::SetupFailed(e);
            }
        };

        let config = LiveConfig {
            options,
            tools: self.tools.declarations(),
            system_instruction: self.system_instruction.clone(),
        };

        let LiveSession { sink, events } = match self.connector.connect(config).await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    session_id = %session_id,
                    provider = self.connector.provider_name(),
                    error = %e,
                    "Failed to open live session"
                );
                let e = BridgeError::Connect(e);
                notify_error(&outbound, &e).await;
                return SessionOutcome::SetupFailed(e);
            }
        };

        info!(
            session_id = %session_id,
            provider = self.connector.provider_name(),
            "Live session opened"
        );

        let writer: SessionWriter = Arc::new(Mutex::new(sink));
        let stats = Arc::new(SessionStats::default());
        let cancel = CancellationToken::new();

        let mut uplink_task = tokio::spawn(run_uplink(
            inbound,
            writer.clone(),
            stats.clone(),
            cancel.clone(),
            session_id.clone(),
        ));
        let mut downlink_task = tokio::spawn(run_downlink(
            events,
            writer.clone(),
            self.tools.clone(),
            outbound.clone(),
            stats.clone(),
            cancel.clone(),
            session_id.clone(),
        ));

        let (uplink, downlink) = tokio::select! {
            result = &mut uplink_task => {
                let uplink = relay_exit(result);
                debug!(session_id = %session_id, exit = ?uplink, "Uplink finished first");
                cancel.cancel();
                (uplink, relay_exit(downlink_task.await))
            }
            result = &mut downlink_task => {
                let downlink = relay_exit(result);
                debug!(session_id = %session_id, exit = ?downlink, "Downlink finished first");
                cancel.cancel();
                (relay_exit(uplink_task.await), downlink)
            }
        };

        if let Err(e) = writer.lock().await.close().await {
            warn!(session_id = %session_id, error = %e, "Error closing live session");
        }

        // The client may already be gone.
        let _ = outbound.send(ClientRoute::Close).await;

        let stats = stats.snapshot();
        info!(
            session_id = %session_id,
            uplink = ?uplink,
            downlink = ?downlink,
            media_forwarded = stats.media_forwarded,
            chunks_dropped = stats.chunks_dropped,
            frames_skipped = stats.frames_skipped,
            tool_calls = stats.tool_calls,
            content_frames = stats.content_frames,
            "Live session ended"
        );

        SessionOutcome::Completed {
            uplink,
            downlink,
            stats,
        }
    }
}

/// Wait for the first text frame and decode it as setup options.
async fn read_setup(inbound: &mut ClientInbound) -> Result<Map<String, Value>, BridgeError> {
    while let Some(frame) = inbound.next().await {
        match frame {
            ClientFrame::Text(text) => return Ok(decode_setup(&text)?),
            ClientFrame::Close => break,
            ClientFrame::Binary(_) | ClientFrame::Control => {
                debug!("Ignoring non-text frame before setup");
            }
        }
    }
    Err(BridgeError::ClientClosedBeforeSetup)
}

async fn notify_error(outbound: &mpsc::Sender<ClientRoute>, error: &BridgeError) {
    let route = ClientRoute::Outgoing(ClientOutgoing::Error(error.to_string()));
    if outbound.send(route).await.is_err() {
        debug!("Client gone before error could be reported");
    }
}

fn relay_exit(result: Result<RelayExit, JoinError>) -> RelayExit {
    match result {
        Ok(exit) => exit,
        Err(e) if e.is_panic() => {
            let msg = extract_panic_message(&e.into_panic());
            error!(message = %msg, "Relay task panicked");
            RelayExit::Panicked(msg)
        }
        Err(_) => RelayExit::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn inbound(frames: Vec<ClientFrame>) -> ClientInbound {
        Box::pin(stream::iter(frames))
    }

    #[tokio::test]
    async fn test_read_setup_skips_control_frames() {
        let mut frames = inbound(vec![
            ClientFrame::Control,
            ClientFrame::Text(r#"{"setup": {"generation_config": {}}}"#.to_string()),
        ]);
        let options = read_setup(&mut frames).await.unwrap();
        assert!(options.contains_key("generation_config"));
    }

    #[tokio::test]
    async fn test_read_setup_client_closed() {
        let mut frames = inbound(vec![ClientFrame::Close]);
        assert!(matches!(
            read_setup(&mut frames).await,
            Err(BridgeError::ClientClosedBeforeSetup)
        ));

        let mut frames = inbound(vec![]);
        assert!(matches!(
            read_setup(&mut frames).await,
            Err(BridgeError::ClientClosedBeforeSetup)
        ));
    }

    #[tokio::test]
    async fn test_read_setup_invalid_json() {
        let mut frames = inbound(vec![ClientFrame::Text("{oops".to_string())]);
        assert!(matches!(
            read_setup(&mut frames).await,
            Err(BridgeError::InvalidSetup(CodecError::InvalidJson(_)))
        ));
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = SessionStats::default();
        stats.media_forwarded();
        stats.media_forwarded();
        stats.chunk_dropped();
        stats.tool_calls(3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.media_forwarded, 2);
        assert_eq!(snapshot.chunks_dropped, 1);
        assert_eq!(snapshot.tool_calls, 3);
        assert_eq!(snapshot.content_frames, 0);
    }

    #[tokio::test]
    async fn test_relay_exit_from_panicked_task() {
        let handle = tokio::spawn(async {
            if true {
                panic!("relay blew up");
            }
            RelayExit::ClientClosed
        });
        assert_eq!(
            relay_exit(handle.await),
            RelayExit::Panicked("relay blew up".to_string())
        );
    }
}
