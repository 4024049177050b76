//! Client wire envelope.
//!
//! One JSON object per WebSocket text frame.
//!
//! ## Client → Server
//!
//! - `{"setup": {...}}` first frame only, options passed through to the model
//! - `{"realtime_input": {"media_chunks": [{"mime_type": "audio/pcm", "data": "<base64>"}]}}`
//!
//! ## Server → Client
//!
//! - `{"text": "..."}` model text, or the JSON-encoded tool response batch
//! - `{"audio": "<base64>"}` model audio
//! - `{"turn_complete": true}` / `{"interrupted": true}`
//! - `{"error": "..."}`

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::live::{FunctionResponse, MediaKind};

/// Mime type prefix of PCM audio chunks. Parameters such as `;rate=16000` are ignored.
pub const AUDIO_PCM_MIME_TYPE: &str = "audio/pcm";

/// Mime type of image chunks.
pub const IMAGE_JPEG_MIME_TYPE: &str = "image/jpeg";

/// Errors raised while decoding or encoding client frames.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(String),

    #[error("Invalid setup frame: {0}")]
    InvalidSetup(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Unsupported mime type: {0}")]
    UnsupportedMimeType(String),

    #[error("Media chunk has no data")]
    EmptyPayload,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// Transport Frames
// =============================================================================

/// A frame read from the client transport, independent of the server framework.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Text(String),
    Binary(Bytes),
    /// Ping/pong and other control frames
    Control,
    Close,
}

/// Routes for the client writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRoute {
    Outgoing(ClientOutgoing),
    Close,
}

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    #[serde(default)]
    setup: Option<Value>,
    #[serde(default)]
    realtime_input: Option<RealtimeInput>,
}

#[derive(Debug, Deserialize)]
struct RealtimeInput {
    // Chunks stay untyped so one bad entry cannot reject its siblings
    #[serde(default)]
    media_chunks: Vec<Value>,
}

/// A media chunk as sent by the client, still base64 encoded.
///
/// Missing or non-string fields read as empty and fail in [`RawMediaChunk::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawMediaChunk {
    pub mime_type: String,
    pub data: String,
}

/// A decoded media chunk ready for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaChunk {
    pub kind: MediaKind,
    pub data: Bytes,
}

/// Decoded client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Setup(Map<String, Value>),
    RealtimeInput(Vec<RawMediaChunk>),
    /// Valid JSON object matching no known envelope
    Unrecognized,
}

/// Decode one client text frame.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, CodecError> {
    let envelope: ClientEnvelope =
        serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;

    if let Some(setup) = envelope.setup {
        return match setup {
            Value::Object(options) => Ok(ClientMessage::Setup(options)),
            Value::Null => Ok(ClientMessage::Setup(Map::new())),
            other => Err(CodecError::InvalidSetup(format!(
                "expected an object, got {}",
                json_type_name(&other)
            ))),
        };
    }

    if let Some(input) = envelope.realtime_input {
        let chunks = input
            .media_chunks
            .iter()
            .map(RawMediaChunk::from_value)
            .collect();
        return Ok(ClientMessage::RealtimeInput(chunks));
    }

    Ok(ClientMessage::Unrecognized)
}

/// Decode the first frame of a session into setup options.
///
/// An object without a `setup` key yields empty options.
pub fn decode_setup(text: &str) -> Result<Map<String, Value>, CodecError> {
    match decode_client_message(text)? {
        ClientMessage::Setup(options) => Ok(options),
        ClientMessage::RealtimeInput(_) => Err(CodecError::InvalidSetup(
            "media received before setup".to_string(),
        )),
        ClientMessage::Unrecognized => Ok(Map::new()),
    }
}

/// Map a declared mime type onto a media kind.
pub fn classify_mime_type(mime_type: &str) -> Option<MediaKind> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        AUDIO_PCM_MIME_TYPE => Some(MediaKind::Audio),
        IMAGE_JPEG_MIME_TYPE => Some(MediaKind::Image),
        _ => None,
    }
}

impl RawMediaChunk {
    fn from_value(value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            mime_type: field("mime_type"),
            data: field("data"),
        }
    }

    /// Classify and base64-decode the chunk.
    pub fn decode(&self) -> Result<MediaChunk, CodecError> {
        let kind = classify_mime_type(&self.mime_type)
            .ok_or_else(|| CodecError::UnsupportedMimeType(self.mime_type.clone()))?;
        if self.data.is_empty() {
            return Err(CodecError::EmptyPayload);
        }
        let data = BASE64_STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        Ok(MediaChunk {
            kind,
            data: Bytes::from(data),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Frames sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientOutgoing {
    Text(String),
    /// Base64 encoded audio
    Audio(String),
    TurnComplete(bool),
    Interrupted(bool),
    Error(String),
}

impl ClientOutgoing {
    pub fn audio(data: &[u8]) -> Self {
        ClientOutgoing::Audio(BASE64_STANDARD.encode(data))
    }

    /// Notification carrying a whole tool response batch as JSON text.
    pub fn tool_echo(responses: &[FunctionResponse]) -> Result<Self, CodecError> {
        serde_json::to_string(responses)
            .map(ClientOutgoing::Text)
            .map_err(|e| CodecError::Serialization(e.to_string()))
    }

    pub fn turn_complete() -> Self {
        ClientOutgoing::TurnComplete(true)
    }

    pub fn interrupted() -> Self {
        ClientOutgoing::Interrupted(true)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Serialization(e.to_string()))
    }
}
