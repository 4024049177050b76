//! Tools the model may call during a live session.
//!
//! - `extract_id_info` logs key fields read from an ID document shown to the camera
//! - `record_transaction` records an expense or income
//!
//! Both persist through an injected [`RecordStore`] and report the storage
//! outcome in their result (`storage_status`, `firebase_document_id`,
//! `storage_error`) so the model can tell the user.

mod id_document;
mod instruction;
mod registry;
mod transaction;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::storage::{RecordStore, StorageResult, StoreOutcome};

pub use id_document::{EXTRACT_ID_INFO, ExtractIdInfoTool};
pub use instruction::DEFAULT_SYSTEM_INSTRUCTION;
pub(crate) use registry::extract_panic_message;
pub use registry::{ToolCallResult, ToolError, ToolHandler, ToolRegistry, ToolResult};
pub use transaction::{RECORD_TRANSACTION, RecordTransactionTool};

/// Build the registry with every built-in tool sharing one store.
pub fn default_registry(store: Arc<dyn RecordStore>, owner_id: Option<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExtractIdInfoTool::new(
        store.clone(),
        owner_id.clone(),
    )));
    registry.register(Arc::new(RecordTransactionTool::new(store, owner_id)));
    registry
}

/// Read an argument as text. Non-string scalars are rendered as JSON.
pub(crate) fn arg_string(arguments: &Map<String, Value>, key: &str) -> Option<String> {
    match arguments.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Record the storage outcome on a tool result.
pub(crate) fn apply_storage_outcome(
    result: &mut Map<String, Value>,
    outcome: StorageResult<StoreOutcome>,
    tool: &str,
) {
    match outcome {
        Ok(StoreOutcome {
            success: true, id, ..
        }) => {
            tracing::info!(tool, document_id = ?id, "Tool result stored");
            result.insert(
                "firebase_document_id".to_string(),
                id.map(Value::String).unwrap_or(Value::Null),
            );
            result.insert(
                "storage_status".to_string(),
                Value::String("stored_successfully".to_string()),
            );
        }
        Ok(StoreOutcome { error, .. }) => {
            let error = error.unwrap_or_else(|| "Unknown error".to_string());
            tracing::warn!(tool, error = %error, "Failed to store tool result");
            result.insert(
                "storage_status".to_string(),
                Value::String("storage_failed".to_string()),
            );
            result.insert("storage_error".to_string(), Value::String(error));
        }
        Err(e) => {
            tracing::error!(tool, error = %e, "Error storing tool result");
            result.insert(
                "storage_status".to_string(),
                Value::String("storage_error".to_string()),
            );
            result.insert("storage_error".to_string(), Value::String(e.to_string()));
        }
    }
}
