//! Gemini Live client implementation.
//!
//! Implements [`LiveConnector`] over the `BidiGenerateContent` WebSocket.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.<version>.GenerativeService.BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (the server may use binary frames)
//! - Input audio: PCM 16-bit, 16kHz, mono, base64 encoded
//!
//! The connection is owned by one spawned task that is the only writer to the
//! socket. The sink half feeds it through a channel; decoded events come back
//! through a second channel exposed as a stream.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use zeroize::Zeroize;

use super::config::GeminiLiveConfig;
use super::messages::{ClientMessage, ServerMessage, build_setup};
use crate::core::live::base::{
    FunctionResponse, LiveConfig, LiveConnector, LiveError, LiveEvent, LiveEventStream,
    LiveResult, LiveSession, LiveSink, MediaKind,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for decoded server events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Time allowed for the connection task to flush a close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

enum Outgoing {
    Message(ClientMessage),
    Close,
}

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> LiveResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }
}

impl Drop for GeminiLiveConnector {
    fn drop(&mut self) {
        self.config.api_key.zeroize();
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, config: LiveConfig) -> LiveResult<LiveSession> {
        let url = self.config.build_ws_url()?;
        let setup = build_setup(&self.config, config);
        let setup_json = serde_json::to_string(&setup)
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;

        let handshake = async move {
            let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

            let (mut ws_sink, mut ws_stream) = ws.split();
            ws_sink
                .send(Message::Text(setup_json.into()))
                .await
                .map_err(|e| LiveError::WebSocketError(e.to_string()))?;

            wait_for_setup_complete(&mut ws_stream).await?;
            Ok::<_, LiveError>((ws_sink, ws_stream))
        };

        let (mut ws_sink, mut ws_stream) =
            tokio::time::timeout(self.config.setup_timeout, handshake)
                .await
                .map_err(|_| {
                    LiveError::Timeout(format!(
                        "setupComplete not received within {}s",
                        self.config.setup_timeout.as_secs()
                    ))
                })??;

        tracing::info!(
            model = %self.config.model,
            api_version = %self.config.api_version,
            "Connected to Gemini Live API"
        );

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Outgoing>(WS_CHANNEL_CAPACITY);
        let (event_tx, mut event_rx) =
            mpsc::channel::<LiveResult<LiveEvent>>(EVENT_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outgoing_rx.recv() => {
                        match outgoing {
                            Some(Outgoing::Message(message)) => {
                                let json = match serde_json::to_string(&message) {
                                    Ok(j) => j,
                                    Err(e) => {
                                        tracing::error!("Failed to serialize Gemini message: {}", e);
                                        continue;
                                    }
                                };

                                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                    tracing::error!("Failed to send WebSocket message: {}", e);
                                    let _ = event_tx
                                        .send(Err(LiveError::WebSocketError(e.to_string())))
                                        .await;
                                    break;
                                }
                            }
                            Some(Outgoing::Close) | None => {
                                if let Err(e) = ws_sink.send(Message::Close(None)).await {
                                    tracing::debug!("Failed to send close frame: {}", e);
                                }
                                break;
                            }
                        }
                    }

                    incoming = ws_stream.next() => {
                        let delivered = match incoming {
                            Some(Ok(Message::Text(text))) => {
                                dispatch_server_message(text.as_bytes(), &event_tx).await
                            }
                            Some(Ok(Message::Binary(data))) => {
                                dispatch_server_message(&data, &event_tx).await
                            }
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!(?frame, "Gemini WebSocket closed by server");
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                                true
                            }
                            Some(Ok(_)) => true,
                            Some(Err(e)) => {
                                tracing::error!("Gemini WebSocket error: {}", e);
                                let _ = event_tx
                                    .send(Err(LiveError::WebSocketError(e.to_string())))
                                    .await;
                                break;
                            }
                            None => {
                                tracing::info!("Gemini WebSocket stream ended");
                                break;
                            }
                        };

                        if !delivered {
                            tracing::debug!("Event receiver dropped, closing Gemini connection");
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }
        });

        let events: LiveEventStream = Box::pin(async_stream::stream! {
            while let Some(event) = event_rx.recv().await {
                yield event;
            }
        });

        Ok(LiveSession {
            sink: Box::new(GeminiLiveSink {
                tx: outgoing_tx,
                task: Some(handle),
            }),
            events,
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

/// Read frames until `setupComplete` arrives.
async fn wait_for_setup_complete<S>(ws_stream: &mut S) -> LiveResult<()>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg) = ws_stream.next().await {
        let payload: Bytes = match msg {
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_bytes()),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Err(LiveError::SetupFailed(format!(
                    "Connection closed during setup: {reason}"
                )));
            }
            Ok(_) => continue,
            Err(e) => return Err(LiveError::WebSocketError(e.to_string())),
        };

        match serde_json::from_slice::<ServerMessage>(&payload) {
            Ok(message) if message.setup_complete.is_some() => return Ok(()),
            Ok(_) => {
                tracing::debug!("Ignoring server message received before setupComplete");
            }
            Err(e) => {
                tracing::warn!("Failed to parse setup response: {}", e);
            }
        }
    }

    Err(LiveError::SetupFailed(
        "Connection ended before setupComplete".to_string(),
    ))
}

/// Decode one server frame and forward its events. Returns false once the
/// receiver is gone.
async fn dispatch_server_message(
    payload: &[u8],
    event_tx: &mpsc::Sender<LiveResult<LiveEvent>>,
) -> bool {
    let message = match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse server message: {}", e);
            return event_tx
                .send(Err(LiveError::SerializationError(e.to_string())))
                .await
                .is_ok();
        }
    };

    if message.is_usage_only() {
        tracing::debug!(usage = ?message.usage_metadata, "Usage metadata received");
        return true;
    }

    let mut events = message.into_events();
    if events.is_empty() {
        events.push(LiveEvent::Unrecognized(
            String::from_utf8_lossy(payload).into_owned(),
        ));
    }

    for event in events {
        if event_tx.send(Ok(event)).await.is_err() {
            return false;
        }
    }
    true
}

// =============================================================================
// Sink
// =============================================================================

/// Outbound half of a Gemini Live session.
pub struct GeminiLiveSink {
    tx: mpsc::Sender<Outgoing>,
    task: Option<JoinHandle<()>>,
}

impl GeminiLiveSink {
    async fn send(&self, message: ClientMessage) -> LiveResult<()> {
        if self.task.is_none() {
            return Err(LiveError::NotConnected);
        }
        self.tx
            .send(Outgoing::Message(message))
            .await
            .map_err(|_| LiveError::NotConnected)
    }
}

#[async_trait]
impl LiveSink for GeminiLiveSink {
    async fn send_media(&mut self, kind: MediaKind, data: Bytes) -> LiveResult<()> {
        self.send(ClientMessage::media(kind, &data)).await
    }

    async fn send_tool_response(&mut self, responses: Vec<FunctionResponse>) -> LiveResult<()> {
        self.send(ClientMessage::tool_response(responses)).await
    }

    async fn close(&mut self) -> LiveResult<()> {
        let Some(mut handle) = self.task.take() else {
            return Ok(());
        };

        // The task may already be gone if the server closed first.
        let _ = self.tx.send(Outgoing::Close).await;

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut handle)
            .await
            .is_err()
        {
            tracing::warn!("Gemini connection task did not stop in time, aborting");
            handle.abort();
        }
        tracing::info!("Gemini Live session closed");
        Ok(())
    }
}

impl Drop for GeminiLiveSink {
    fn drop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_requires_api_key() {
        let result = GeminiLiveConnector::new(GeminiLiveConfig::default());
        assert!(matches!(result, Err(LiveError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_connector_creation() {
        let connector = GeminiLiveConnector::new(GeminiLiveConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(connector.provider_name(), "gemini");
        assert_eq!(connector.config().model, "gemini-2.0-flash-exp");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_failure() {
        let connector = GeminiLiveConnector::new(GeminiLiveConfig {
            api_key: "test_key".to_string(),
            base_url: "ws://127.0.0.1:1".to_string(),
            setup_timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap();

        let result = connector.connect(LiveConfig::default()).await;
        assert!(matches!(result, Err(LiveError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_dispatch_unrecognized_message() {
        let (tx, mut rx) = mpsc::channel(4);
        assert!(dispatch_server_message(br#"{"somethingNew": 1}"#, &tx).await);
        match rx.recv().await {
            Some(Ok(LiveEvent::Unrecognized(raw))) => assert!(raw.contains("somethingNew")),
            other => panic!("Expected unrecognized event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_malformed_message_yields_error() {
        let (tx, mut rx) = mpsc::channel(4);
        assert!(dispatch_server_message(b"not json", &tx).await);
        assert!(matches!(
            rx.recv().await,
            Some(Err(LiveError::SerializationError(_)))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        assert!(!dispatch_server_message(br#"{"setupComplete": {}}"#, &tx).await);
    }
}
