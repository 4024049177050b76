//! Configuration module for the live bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use live_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::live::gemini::{GeminiApiVersion, GeminiLiveConfig};
use crate::core::storage::FirestoreConfig;
use crate::core::tools::DEFAULT_SYSTEM_INSTRUCTION;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 9082;

/// Default cap on concurrent sessions from one address.
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: usize = 100;

/// Where tool results are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// In-process and lost on restart; each collection keeps only its most
    /// recent records. For development and tests.
    #[default]
    Memory,
    Firestore,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Firestore => "firestore",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "firestore" => Ok(Self::Firestore),
            other => Err(format!(
                "Invalid storage backend '{other}'. Expected 'memory' or 'firestore'"
            )),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge:
/// - Server settings (host, port)
/// - Gemini Live connection settings
/// - Session defaults (system instruction, record owner)
/// - Record storage backend
/// - Security settings (CORS, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Gemini Live settings
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_version: GeminiApiVersion,
    pub gemini_base_url: String,
    /// Seconds allowed for connect plus setup handshake
    pub setup_timeout_secs: u64,

    // Session settings
    /// Overrides the built-in wallet assistant instruction
    pub system_instruction: Option<String>,
    /// Stored as `user_id` on every record; `anonymous` when unset
    pub owner_id: Option<String>,

    // Storage settings
    pub storage_backend: StorageBackend,
    pub firestore_project_id: Option<String>,
    /// OAuth access token for the Firestore REST API
    pub firestore_access_token: Option<String>,
    pub firestore_base_url: String,

    // Security settings
    pub cors_allowed_origins: Option<String>,
    /// Global cap on concurrent WebSocket sessions (unlimited when `None`)
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: usize,
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.firestore_access_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The `.env` file is loaded in `main.rs` before this runs, so its values
    /// are visible here as regular environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_gemini(self)?;
        validation::validate_storage(self)?;
        validation::validate_connection_limits(self)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Instruction sent to the model at the start of every session.
    pub fn system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
    }

    /// Connector settings derived from this configuration.
    pub fn gemini_live_config(&self) -> GeminiLiveConfig {
        GeminiLiveConfig {
            api_key: self.gemini_api_key.clone().unwrap_or_default(),
            model: self.gemini_model.clone(),
            api_version: self.gemini_api_version,
            base_url: self.gemini_base_url.clone(),
            setup_timeout: Duration::from_secs(self.setup_timeout_secs),
        }
    }

    /// Firestore settings, when that backend is selected.
    pub fn firestore_config(&self) -> Option<FirestoreConfig> {
        if self.storage_backend != StorageBackend::Firestore {
            return None;
        }
        Some(FirestoreConfig {
            project_id: self.firestore_project_id.clone().unwrap_or_default(),
            access_token: self.firestore_access_token.clone(),
            base_url: self.firestore_base_url.clone(),
        })
    }
}
