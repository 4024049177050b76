use super::ServerConfig;
use super::env::load_from_env;
use super::yaml::YamlConfig;
use crate::core::live::gemini::GeminiApiVersion;

/// Load the environment configuration and apply YAML overrides on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(gemini) = yaml.gemini {
        if gemini.api_key.is_some() {
            config.gemini_api_key = gemini.api_key;
        }
        if let Some(model) = gemini.model {
            config.gemini_model = model;
        }
        if let Some(version) = gemini.api_version {
            config.gemini_api_version = GeminiApiVersion::from_str_or_default(&version);
        }
        if let Some(base_url) = gemini.base_url {
            config.gemini_base_url = base_url;
        }
        if let Some(timeout) = gemini.setup_timeout_secs {
            config.setup_timeout_secs = timeout;
        }
    }

    if let Some(session) = yaml.session {
        if session.system_instruction.is_some() {
            config.system_instruction = session.system_instruction;
        }
        if session.owner_id.is_some() {
            config.owner_id = session.owner_id;
        }
    }

    if let Some(storage) = yaml.storage {
        if let Some(backend) = storage.backend {
            config.storage_backend = backend.parse()?;
        }
        if let Some(firestore) = storage.firestore {
            if firestore.project_id.is_some() {
                config.firestore_project_id = firestore.project_id;
            }
            if firestore.access_token.is_some() {
                config.firestore_access_token = firestore.access_token;
            }
            if let Some(base_url) = firestore.base_url {
                config.firestore_base_url = base_url;
            }
        }
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if security.max_websocket_connections.is_some() {
            config.max_websocket_connections = security.max_websocket_connections;
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(config)
}
