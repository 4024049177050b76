//! Gemini Live API configuration types.
//!
//! - Endpoint and API version selection
//! - Model naming
//! - Media mime types expected by the backend

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::live::base::{LiveError, LiveResult};

/// Default Gemini Live host.
pub const GEMINI_LIVE_BASE_URL: &str = "wss://generativelanguage.googleapis.com";

/// Default model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

/// Mime type tag for audio forwarded to the model (16 kHz PCM).
pub const INPUT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Mime type tag for image frames forwarded to the model.
pub const INPUT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Default time allowed for the setup handshake.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// API Version
// =============================================================================

/// Gemini API surface hosting the live endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeminiApiVersion {
    #[default]
    V1Alpha,
    V1Beta,
}

impl GeminiApiVersion {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1Alpha => "v1alpha",
            Self::V1Beta => "v1beta",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "v1beta" => Self::V1Beta,
            "v1alpha" => Self::V1Alpha,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for GeminiApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Connector Configuration
// =============================================================================

/// Connection settings for the Gemini Live connector.
#[derive(Debug, Clone)]
pub struct GeminiLiveConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Model id, with or without the `models/` prefix
    pub model: String,
    pub api_version: GeminiApiVersion,
    /// Scheme and host of the endpoint (overridable for tests)
    pub base_url: String,
    /// Time allowed for connect plus `setupComplete`
    pub setup_timeout: Duration,
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_version: GeminiApiVersion::default(),
            base_url: GEMINI_LIVE_BASE_URL.to_string(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }
}

impl GeminiLiveConfig {
    /// Model resource name as the setup message expects it.
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// Full WebSocket URL of the bidirectional endpoint.
    pub fn build_ws_url(&self) -> LiveResult<Url> {
        let endpoint = format!(
            "{}/ws/google.ai.generativelanguage.{}.GenerativeService.BidiGenerateContent",
            self.base_url.trim_end_matches('/'),
            self.api_version.as_str()
        );
        Url::parse_with_params(&endpoint, &[("key", self.api_key.as_str())])
            .map_err(|e| LiveError::InvalidConfiguration(format!("Invalid endpoint URL: {e}")))
    }

    /// Check the settings before dialing out.
    pub fn validate(&self) -> LiveResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(LiveError::InvalidConfiguration(
                "Gemini API key is required".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(LiveError::InvalidConfiguration(
                "Gemini model is required".to_string(),
            ));
        }
        Ok(())
    }
}
