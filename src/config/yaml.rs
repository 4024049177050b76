use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 9082
///
/// gemini:
///   api_key: "your-gemini-key"
///   model: "gemini-2.0-flash-exp"
///   api_version: "v1alpha"
///   setup_timeout_secs: 30
///
/// session:
///   owner_id: "user-123"
///   system_instruction: "You are a helpful assistant."
///
/// storage:
///   backend: "firestore"
///   firestore:
///     project_id: "my-project"
///     access_token: "ya29...."
///
/// security:
///   cors_allowed_origins: "*"
///   max_websocket_connections: 100
///   max_connections_per_ip: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub session: Option<SessionYaml>,
    pub storage: Option<StorageYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Gemini Live connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
    /// Endpoint scheme and host, e.g. a local mock server
    pub base_url: Option<String>,
    pub setup_timeout_secs: Option<u64>,
}

/// Per-session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub system_instruction: Option<String>,
    pub owner_id: Option<String>,
}

/// Record storage settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    /// `memory` or `firestore`
    pub backend: Option<String>,
    pub firestore: Option<FirestoreYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FirestoreYaml {
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub base_url: Option<String>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
