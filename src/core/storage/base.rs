//! Record store abstraction used by the tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Collection holding extracted ID documents.
pub const ID_DOCUMENTS_COLLECTION: &str = "id_documents";

/// Collection holding recorded transactions.
pub const TRANSACTIONS_COLLECTION: &str = "transactions";

/// Owner recorded when no user is known.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Errors raised while reaching the storage backend.
///
/// A backend that answers but refuses the write reports a failed
/// [`StoreOutcome`] instead.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid storage response: {0}")]
    InvalidResponse(String),

    #[error("Invalid storage configuration: {0}")]
    InvalidConfiguration(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of one store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreOutcome {
    pub fn stored(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            error: Some(error.into()),
        }
    }
}

/// Durable storage for records produced by tools.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record under `collection`, attributed to `owner_id`.
    async fn store(
        &self,
        collection: &str,
        record: Map<String, Value>,
        owner_id: Option<&str>,
    ) -> StorageResult<StoreOutcome>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Current time as an RFC 3339 UTC string.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Add the bookkeeping fields every stored record carries.
pub fn with_metadata(mut record: Map<String, Value>, owner_id: Option<&str>) -> Map<String, Value> {
    let now = now_rfc3339();
    let owner = owner_id
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_OWNER);

    record.insert("timestamp".to_string(), Value::String(now.clone()));
    record.insert("user_id".to_string(), Value::String(owner.to_string()));
    record.insert("status".to_string(), Value::String("active".to_string()));
    record.insert("created_at".to_string(), Value::String(now.clone()));
    record.insert("updated_at".to_string(), Value::String(now));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_metadata_defaults_owner() {
        let mut record = Map::new();
        record.insert("name".to_string(), json!("Jane"));

        let enriched = with_metadata(record, None);
        assert_eq!(enriched["name"], "Jane");
        assert_eq!(enriched["user_id"], "anonymous");
        assert_eq!(enriched["status"], "active");
        assert!(enriched.contains_key("timestamp"));
        assert_eq!(enriched["created_at"], enriched["updated_at"]);
    }

    #[test]
    fn test_with_metadata_owner() {
        let enriched = with_metadata(Map::new(), Some("user-7"));
        assert_eq!(enriched["user_id"], "user-7");

        let enriched = with_metadata(Map::new(), Some(""));
        assert_eq!(enriched["user_id"], "anonymous");
    }

    #[test]
    fn test_now_rfc3339_format() {
        let now = now_rfc3339();
        assert!(now.contains('T'));
        assert!(OffsetDateTime::parse(&now, &Rfc3339).is_ok());
    }

    #[test]
    fn test_store_outcome_constructors() {
        let ok = StoreOutcome::stored("doc-1");
        assert!(ok.success);
        assert_eq!(ok.id.as_deref(), Some("doc-1"));

        let failed = StoreOutcome::failed("quota");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("quota"));
    }
}
