use super::{ServerConfig, StorageBackend};

/// A Gemini API key is required to open live sessions.
pub(super) fn validate_gemini(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let has_key = config
        .gemini_api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    if !has_key {
        return Err("GEMINI_API_KEY (or GOOGLE_API_KEY) must be set".into());
    }
    if config.gemini_model.trim().is_empty() {
        return Err("GEMINI_MODEL must not be empty".into());
    }
    if config.setup_timeout_secs == 0 {
        return Err("LIVE_SETUP_TIMEOUT_SECS must be greater than zero".into());
    }
    Ok(())
}

/// The Firestore backend needs a project id.
pub(super) fn validate_storage(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.storage_backend == StorageBackend::Firestore
        && config
            .firestore_project_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty())
    {
        return Err("FIRESTORE_PROJECT_ID is required when STORAGE_BACKEND is 'firestore'".into());
    }
    Ok(())
}

pub(super) fn validate_connection_limits(
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.max_connections_per_ip == 0 {
        return Err("MAX_CONNECTIONS_PER_IP must be greater than zero".into());
    }
    if config.max_websocket_connections == Some(0) {
        return Err("MAX_WEBSOCKET_CONNECTIONS must be greater than zero".into());
    }
    Ok(())
}
