//! Model → client relay, including the tool-call sub-protocol.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::{RelayExit, SessionStats, SessionWriter};
use crate::core::codec::{ClientOutgoing, ClientRoute};
use crate::core::live::{
    ContentPart, FunctionResponse, LiveEvent, LiveEventStream, ToolCallRequest,
};
use crate::core::tools::ToolRegistry;

/// Shared context for handling model events.
struct Downlink<'a> {
    writer: &'a SessionWriter,
    tools: &'a ToolRegistry,
    outbound: &'a mpsc::Sender<ClientRoute>,
    stats: &'a SessionStats,
    session_id: &'a str,
}

/// Relay model events to the client until the model stream ends, a write
/// fails or the session is cancelled.
pub(crate) async fn run_downlink(
    mut events: LiveEventStream,
    writer: SessionWriter,
    tools: Arc<ToolRegistry>,
    outbound: mpsc::Sender<ClientRoute>,
    stats: Arc<SessionStats>,
    cancel: CancellationToken,
    session_id: String,
) -> RelayExit {
    let downlink = Downlink {
        writer: &writer,
        tools: &tools,
        outbound: &outbound,
        stats: &stats,
        session_id: &session_id,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(session_id = %session_id, "Downlink cancelled");
                return RelayExit::Cancelled;
            }
            next = events.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) if e.is_transport_failure() => {
                error!(session_id = %session_id, error = %e, "Live session transport failed");
                return RelayExit::TransportError(e.to_string());
            }
            Some(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Skipping undecodable model message");
                continue;
            }
            None => {
                info!(session_id = %session_id, "Live session closed by model");
                return RelayExit::ModelClosed;
            }
        };

        if let ControlFlow::Break(exit) = downlink.handle_event(event).await {
            return exit;
        }
    }
}

impl Downlink<'_> {
    async fn handle_event(&self, event: LiveEvent) -> ControlFlow<RelayExit> {
        debug!(session_id = %self.session_id, kind = event.kind(), "Model event");

        match event {
            LiveEvent::ToolCallBatch(requests) => self.handle_tool_calls(requests).await,
            LiveEvent::Content(parts) => {
                for part in parts {
                    let message = match part {
                        ContentPart::Text(text) => ClientOutgoing::Text(text),
                        ContentPart::InlineData { data, .. } => ClientOutgoing::audio(&data),
                    };
                    self.send_client(message).await?;
                    self.stats.content_frame();
                }
                ControlFlow::Continue(())
            }
            LiveEvent::TurnComplete => self.send_client(ClientOutgoing::turn_complete()).await,
            LiveEvent::Interrupted => self.send_client(ClientOutgoing::interrupted()).await,
            LiveEvent::ToolCallCancellation(ids) => {
                info!(session_id = %self.session_id, ids = ?ids, "Model cancelled tool calls");
                ControlFlow::Continue(())
            }
            LiveEvent::GoAway => {
                warn!(session_id = %self.session_id, "Model announced session shutdown");
                ControlFlow::Continue(())
            }
            LiveEvent::SetupComplete => ControlFlow::Continue(()),
            LiveEvent::Unrecognized(raw) => {
                debug!(session_id = %self.session_id, raw = %raw, "Ignoring unrecognized model message");
                ControlFlow::Continue(())
            }
        }
    }

    /// Run a whole batch, echo it to the client, then answer the model once.
    async fn handle_tool_calls(&self, requests: Vec<ToolCallRequest>) -> ControlFlow<RelayExit> {
        info!(
            session_id = %self.session_id,
            count = requests.len(),
            "Tool call batch received"
        );
        self.stats.tool_calls(requests.len());

        let responses: Vec<FunctionResponse> = self
            .tools
            .invoke_batch(&requests)
            .await
            .into_iter()
            .map(|result| result.into_function_response())
            .collect();

        match ClientOutgoing::tool_echo(&responses) {
            Ok(echo) => {
                if self
                    .outbound
                    .send(ClientRoute::Outgoing(echo))
                    .await
                    .is_err()
                {
                    debug!(session_id = %self.session_id, "Client gone, tool echo dropped");
                }
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Failed to encode tool echo");
            }
        }

        let result = self.writer.lock().await.send_tool_response(responses).await;
        match result {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) if e.is_transport_failure() => {
                error!(session_id = %self.session_id, error = %e, "Failed to send tool response");
                ControlFlow::Break(RelayExit::ModelWriteFailed)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Tool response rejected");
                ControlFlow::Continue(())
            }
        }
    }

    async fn send_client(&self, message: ClientOutgoing) -> ControlFlow<RelayExit> {
        match self.outbound.send(ClientRoute::Outgoing(message)).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => {
                info!(session_id = %self.session_id, "Client writer closed, stopping downlink");
                ControlFlow::Break(RelayExit::ClientWriteFailed)
            }
        }
    }
}
