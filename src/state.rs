//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::bridge::SessionBridge;
use crate::core::live::{GeminiLiveConnector, LiveConnector};
use crate::core::storage::{
    DEFAULT_MAX_RECORDS_PER_COLLECTION, FirestoreRecordStore, MemoryRecordStore, RecordStore,
};
use crate::core::tools::default_registry;

/// Why a new WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("global connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    pub bridge: SessionBridge,
    pub store: Arc<dyn RecordStore>,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bridge", &self.bridge)
            .field("storage", &self.store.backend_name())
            .field("ws_connections", &self.ws_connection_count())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the Gemini connector, record store and tool registry from config.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let connector = GeminiLiveConnector::new(config.gemini_live_config())?;

        let store: Arc<dyn RecordStore> = match config.firestore_config() {
            Some(firestore) => Arc::new(FirestoreRecordStore::new(firestore)?),
            None => {
                warn!(
                    max_records_per_collection = DEFAULT_MAX_RECORDS_PER_COLLECTION,
                    "Using the in-memory record store; tool results are not persisted"
                );
                Arc::new(MemoryRecordStore::new())
            }
        };

        info!(
            provider = connector.provider_name(),
            model = %config.gemini_model,
            storage = store.backend_name(),
            "Application state initialized"
        );

        Ok(Self::with_components(config, Arc::new(connector), store))
    }

    /// Assemble state around an existing connector and store.
    pub fn with_components(
        config: ServerConfig,
        connector: Arc<dyn LiveConnector>,
        store: Arc<dyn RecordStore>,
    ) -> Arc<Self> {
        let tools = default_registry(store.clone(), config.owner_id.clone());
        let bridge = SessionBridge::new(
            connector,
            Arc::new(tools),
            Some(config.system_instruction().to_string()),
        );

        Arc::new(Self {
            config,
            bridge,
            store,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a WebSocket slot for `ip`, honoring global and per-IP limits.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max_global = self.config.max_websocket_connections;
        self.ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match max_global {
                    Some(max) if current >= max => None,
                    _ => Some(current + 1),
                }
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        let max_per_ip = self.config.max_connections_per_ip;
        let mut count = self.ip_connections.entry(ip).or_insert(0);
        if *count >= max_per_ip {
            drop(count);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *count += 1;
        Ok(())
    }

    /// Release a slot previously acquired for `ip`.
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
