use std::env;
use std::str::FromStr;

use super::{DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS_PER_IP, DEFAULT_PORT, ServerConfig, StorageBackend};
use crate::core::live::gemini::{
    DEFAULT_GEMINI_MODEL, DEFAULT_SETUP_TIMEOUT, GEMINI_LIVE_BASE_URL, GeminiApiVersion,
};
use crate::core::storage::FIRESTORE_BASE_URL;

/// Read a variable, treating empty values as unset.
fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable.
fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid {name} value '{raw}': {e}")),
        None => Ok(None),
    }
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let storage_backend = match env_opt("STORAGE_BACKEND") {
        Some(raw) => raw.parse::<StorageBackend>()?,
        None => StorageBackend::default(),
    };

    Ok(ServerConfig {
        host: env_opt("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env_parse("PORT")?.unwrap_or(DEFAULT_PORT),

        gemini_api_key: env_opt("GEMINI_API_KEY").or_else(|| env_opt("GOOGLE_API_KEY")),
        gemini_model: env_opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        gemini_api_version: env_opt("GEMINI_API_VERSION")
            .map(|v| GeminiApiVersion::from_str_or_default(&v))
            .unwrap_or_default(),
        gemini_base_url: env_opt("GEMINI_BASE_URL")
            .unwrap_or_else(|| GEMINI_LIVE_BASE_URL.to_string()),
        setup_timeout_secs: env_parse("LIVE_SETUP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_SETUP_TIMEOUT.as_secs()),

        system_instruction: env_opt("SYSTEM_INSTRUCTION"),
        owner_id: env_opt("OWNER_ID"),

        storage_backend,
        firestore_project_id: env_opt("FIRESTORE_PROJECT_ID"),
        firestore_access_token: env_opt("FIRESTORE_ACCESS_TOKEN"),
        firestore_base_url: env_opt("FIRESTORE_BASE_URL")
            .unwrap_or_else(|| FIRESTORE_BASE_URL.to_string()),

        cors_allowed_origins: env_opt("CORS_ALLOWED_ORIGINS"),
        max_websocket_connections: env_parse("MAX_WEBSOCKET_CONNECTIONS")?,
        max_connections_per_ip: env_parse("MAX_CONNECTIONS_PER_IP")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    })
}
