//! Base traits and types for live model connectors.
//!
//! A live connector opens one full-duplex streaming session with a model
//! backend. The session is split into two halves:
//!
//! - a [`LiveSink`] used to push media and tool responses to the model
//! - a [`LiveEventStream`] of decoded [`LiveEvent`]s coming back
//!
//! Events are classified once at the connector boundary so the bridge can
//! match them exhaustively.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to a live model session.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the model backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The setup handshake did not complete
    #[error("Setup failed: {0}")]
    SetupFailed(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The session is no longer connected
    #[error("Not connected")]
    NotConnected,

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl LiveError {
    /// Whether the underlying transport is gone and the session cannot recover.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            LiveError::ConnectionFailed(_) | LiveError::WebSocketError(_) | LiveError::NotConnected
        )
    }
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Media
// =============================================================================

/// Kind of media forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// PCM audio samples
    Audio,
    /// Still image frame (JPEG)
    Image,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Declared schema of a callable tool, sent once at session setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// Parameter schema (OBJECT / STRING typed, as the model expects it)
    pub parameters: Value,
}

/// Final configuration used to open a live session.
#[derive(Debug, Clone, Default)]
pub struct LiveConfig {
    /// Caller-supplied options passed through to the model setup
    pub options: Map<String, Value>,
    /// Server-controlled tool declarations
    pub tools: Vec<ToolDeclaration>,
    /// Server-controlled system instruction
    pub system_instruction: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Opaque correlation token, echoed back unchanged
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// The answer for one [`ToolCallRequest`], as sent back to the model.
///
/// Field order matches the notification echoed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
    pub id: String,
}

/// One unit of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Raw bytes decoded from the model's inline data (usually PCM audio)
    InlineData { mime_type: String, data: Bytes },
}

/// Events emitted by a live session, decided once at the connector boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// The setup handshake completed
    SetupComplete,
    /// The model wants these functions executed before it continues
    ToolCallBatch(Vec<ToolCallRequest>),
    /// Model output parts, in order
    Content(Vec<ContentPart>),
    /// The model finished its turn
    TurnComplete,
    /// The model output was interrupted by user activity
    Interrupted,
    /// Previously requested calls were cancelled by the model
    ToolCallCancellation(Vec<String>),
    /// The backend is about to close the session
    GoAway,
    /// Anything the connector does not understand
    Unrecognized(String),
}

impl LiveEvent {
    /// Short name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::SetupComplete => "setup_complete",
            LiveEvent::ToolCallBatch(_) => "tool_call",
            LiveEvent::Content(_) => "content",
            LiveEvent::TurnComplete => "turn_complete",
            LiveEvent::Interrupted => "interrupted",
            LiveEvent::ToolCallCancellation(_) => "tool_call_cancellation",
            LiveEvent::GoAway => "go_away",
            LiveEvent::Unrecognized(_) => "unrecognized",
        }
    }
}

// =============================================================================
// Session Traits
// =============================================================================

/// Lazy sequence of events coming back from the model.
pub type LiveEventStream = Pin<Box<dyn Stream<Item = LiveResult<LiveEvent>> + Send>>;

/// Outbound half of a live session.
#[async_trait]
pub trait LiveSink: Send {
    /// Forward one media chunk to the model.
    async fn send_media(&mut self, kind: MediaKind, data: Bytes) -> LiveResult<()>;

    /// Answer a whole tool-call batch in one response.
    async fn send_tool_response(&mut self, responses: Vec<FunctionResponse>) -> LiveResult<()>;

    /// Release the session. Must be safe to call more than once.
    async fn close(&mut self) -> LiveResult<()>;
}

/// An open live session.
pub struct LiveSession {
    pub sink: Box<dyn LiveSink>,
    pub events: LiveEventStream,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession").finish_non_exhaustive()
    }
}

/// Opens live sessions with a model backend.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session and complete its setup handshake.
    async fn connect(&self, config: LiveConfig) -> LiveResult<LiveSession>;

    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LiveError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = LiveError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_transport_failure_classification() {
        assert!(LiveError::NotConnected.is_transport_failure());
        assert!(LiveError::WebSocketError("reset".into()).is_transport_failure());
        assert!(!LiveError::SerializationError("bad".into()).is_transport_failure());
        assert!(!LiveError::Timeout("setup".into()).is_transport_failure());
    }

    #[test]
    fn test_media_kind_display() {
        assert_eq!(MediaKind::Audio.to_string(), "audio");
        assert_eq!(MediaKind::Image.to_string(), "image");
    }

    #[test]
    fn test_function_response_field_order() {
        let response = FunctionResponse {
            name: "record_transaction".to_string(),
            response: serde_json::json!({"result": {}}),
            id: "c1".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"name":"record_transaction","response":{"result":{}},"id":"c1"}"#
        );
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(LiveEvent::TurnComplete.kind(), "turn_complete");
        assert_eq!(LiveEvent::ToolCallBatch(vec![]).kind(), "tool_call");
        assert_eq!(LiveEvent::Unrecognized("x".into()).kind(), "unrecognized");
    }
}
