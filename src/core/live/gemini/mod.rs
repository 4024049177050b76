//! Gemini Live API connector.
//!
//! Streams PCM audio and JPEG frames to a Gemini model over the
//! `BidiGenerateContent` WebSocket and surfaces its output, including
//! function calls, as [`LiveEvent`](crate::core::live::LiveEvent)s.
//!
//! # Example
//!
//! ```rust,ignore
//! use live_bridge::core::live::{LiveConfig, LiveConnector};
//! use live_bridge::core::live::gemini::{GeminiLiveConfig, GeminiLiveConnector};
//!
//! let connector = GeminiLiveConnector::new(GeminiLiveConfig {
//!     api_key: "...".to_string(),
//!     ..Default::default()
//! })?;
//! let session = connector.connect(LiveConfig::default()).await?;
//! ```

mod client;
mod config;
pub mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveSink};
pub use config::{
    DEFAULT_GEMINI_MODEL, DEFAULT_SETUP_TIMEOUT, GEMINI_LIVE_BASE_URL, GeminiApiVersion,
    GeminiLiveConfig, INPUT_AUDIO_MIME_TYPE, INPUT_IMAGE_MIME_TYPE,
};
