//! Storage collaborators for tool output.
//!
//! Tools receive an `Arc<dyn RecordStore>` at construction. Two backends:
//! - [`MemoryRecordStore`] keeps a bounded set of records in process
//!   (default backend, development and tests only)
//! - [`FirestoreRecordStore`] writes documents through the Firestore REST API

mod base;
mod firestore;
mod memory;

pub use base::{
    ANONYMOUS_OWNER, ID_DOCUMENTS_COLLECTION, RecordStore, StorageError, StorageResult,
    StoreOutcome, TRANSACTIONS_COLLECTION, now_rfc3339, with_metadata,
};
pub use firestore::{
    FIRESTORE_BASE_URL, FirestoreConfig, FirestoreRecordStore, encode_fields, encode_value,
};
pub use memory::{DEFAULT_MAX_RECORDS_PER_COLLECTION, MemoryRecordStore};
