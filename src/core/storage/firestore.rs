//! Firestore REST record store.
//!
//! Writes each record as a new document with an auto-generated id:
//!
//! `POST {base}/v1/projects/{project}/databases/(default)/documents/{collection}`
//!
//! The body is a Firestore `Document` with typed values. The document id is
//! the last path segment of the returned `name`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use zeroize::Zeroize;

use super::base::{RecordStore, StorageError, StorageResult, StoreOutcome, with_metadata};

/// Public Firestore REST endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// Request timeout for document writes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Field stored as a Firestore timestamp rather than a string.
const TIMESTAMP_FIELD: &str = "timestamp";

/// Connection settings for [`FirestoreRecordStore`].
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// OAuth access token, sent as a bearer token when present
    pub access_token: Option<String>,
    pub base_url: String,
}

impl Drop for FirestoreConfig {
    fn drop(&mut self) {
        if let Some(ref mut token) = self.access_token {
            token.zeroize();
        }
    }
}

/// Stores records in Cloud Firestore through its REST API.
#[derive(Debug, Clone)]
pub struct FirestoreRecordStore {
    client: reqwest::Client,
    config: FirestoreConfig,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    name: String,
}

impl FirestoreRecordStore {
    pub fn new(config: FirestoreConfig) -> StorageResult<Self> {
        if config.project_id.trim().is_empty() {
            return Err(StorageError::InvalidConfiguration(
                "Firestore project id is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::InvalidConfiguration(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            collection
        )
    }
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    async fn store(
        &self,
        collection: &str,
        record: Map<String, Value>,
        owner_id: Option<&str>,
    ) -> StorageResult<StoreOutcome> {
        let record = with_metadata(record, owner_id);
        let body = json!({ "fields": encode_fields(&record) });

        let mut request = self.client.post(self.collection_url(collection)).json(&body);
        if let Some(token) = self.config.access_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(collection, %status, "Firestore rejected document write");
            return Ok(StoreOutcome::failed(format!(
                "Firestore returned {status}: {text}"
            )));
        }

        let created: CreatedDocument = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        let id = created
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                StorageError::InvalidResponse(format!("Unexpected document name: {}", created.name))
            })?
            .to_string();

        tracing::info!(collection, document_id = %id, "Stored record in Firestore");
        Ok(StoreOutcome::stored(id))
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

/// Encode a JSON object as Firestore document fields.
pub fn encode_fields(record: &Map<String, Value>) -> Value {
    let fields: Map<String, Value> = record
        .iter()
        .map(|(key, value)| {
            let encoded = match (key.as_str(), value) {
                (TIMESTAMP_FIELD, Value::String(ts)) => json!({ "timestampValue": ts }),
                _ => encode_value(value),
            };
            (key.clone(), encoded)
        })
        .collect();
    Value::Object(fields)
}

/// Encode one JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}
