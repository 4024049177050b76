//! Live model sessions.
//!
//! [`LiveConnector`] is the seam between the session bridge and the model
//! backend. The Gemini implementation lives in [`gemini`].

mod base;
pub mod gemini;

pub use base::{
    ContentPart, FunctionResponse, LiveConfig, LiveConnector, LiveError, LiveEvent,
    LiveEventStream, LiveResult, LiveSession, LiveSink, MediaKind, ToolCallRequest,
    ToolDeclaration,
};
pub use gemini::{GeminiLiveConfig, GeminiLiveConnector};
