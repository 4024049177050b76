//! In-process record store.
//!
//! Meant for development and tests: records vanish on restart and each
//! collection keeps only its most recent entries.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::base::{RecordStore, StorageResult, StoreOutcome, with_metadata};

/// Records kept per collection before the oldest are evicted.
pub const DEFAULT_MAX_RECORDS_PER_COLLECTION: usize = 10_000;

/// Keeps records in memory, keyed by collection and generated document id.
#[derive(Debug)]
pub struct MemoryRecordStore {
    collections: DashMap<String, VecDeque<(String, Map<String, Value>)>>,
    max_records_per_collection: usize,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECORDS_PER_COLLECTION)
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keeping at most `max_records_per_collection` records (minimum 1)
    /// in each collection.
    pub fn with_capacity(max_records_per_collection: usize) -> Self {
        Self {
            collections: DashMap::new(),
            max_records_per_collection: max_records_per_collection.max(1),
        }
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(doc_id, _)| doc_id == id)
                .map(|(_, doc)| doc.clone())
        })
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn store(
        &self,
        collection: &str,
        record: Map<String, Value>,
        owner_id: Option<&str>,
    ) -> StorageResult<StoreOutcome> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let record = with_metadata(record, owner_id);

        let mut docs = self.collections.entry(collection.to_string()).or_default();
        docs.push_back((id.clone(), record));
        while docs.len() > self.max_records_per_collection {
            if let Some((evicted, _)) = docs.pop_front() {
                tracing::debug!(collection, document_id = %evicted, "Evicted oldest in-memory record");
            }
        }
        drop(docs);

        tracing::debug!(collection, document_id = %id, "Stored record in memory");
        Ok(StoreOutcome::stored(id))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
