use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::registry::{ToolHandler, ToolResult};
use super::{apply_storage_outcome, arg_string};
use crate::core::live::ToolDeclaration;
use crate::core::storage::{ID_DOCUMENTS_COLLECTION, RecordStore};

pub const EXTRACT_ID_INFO: &str = "extract_id_info";

const FIELDS: [&str; 5] = [
    "name",
    "id_number",
    "date_of_birth",
    "address",
    "additional_info",
];

/// Logs the key fields of an ID document and stores them.
pub struct ExtractIdInfoTool {
    store: Arc<dyn RecordStore>,
    owner_id: Option<String>,
}

impl ExtractIdInfoTool {
    pub fn new(store: Arc<dyn RecordStore>, owner_id: Option<String>) -> Self {
        Self { store, owner_id }
    }
}

#[async_trait]
impl ToolHandler for ExtractIdInfoTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: EXTRACT_ID_INFO.to_string(),
            description:
                "Extract and log important key-value pairs from an ID document shown to the camera."
                    .to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "name": {
                        "type": "STRING",
                        "description": "Full name as it appears on the ID"
                    },
                    "id_number": {
                        "type": "STRING",
                        "description": "The ID number or document number"
                    },
                    "date_of_birth": {
                        "type": "STRING",
                        "description": "Date of birth in the format shown on the ID"
                    },
                    "address": {
                        "type": "STRING",
                        "description": "Address information from the ID"
                    },
                    "additional_info": {
                        "type": "STRING",
                        "description": "Any other important information visible on the ID"
                    }
                },
                "required": ["name", "id_number"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> ToolResult<Map<String, Value>> {
        let mut result = Map::new();
        for field in FIELDS {
            let value = arg_string(&arguments, field).unwrap_or_default();
            result.insert(field.to_string(), Value::String(value));
        }
        result.insert(
            "extraction_status".to_string(),
            Value::String("success".to_string()),
        );

        let outcome = self
            .store
            .store(
                ID_DOCUMENTS_COLLECTION,
                result.clone(),
                self.owner_id.as_deref(),
            )
            .await;
        apply_storage_outcome(&mut result, outcome, EXTRACT_ID_INFO);

        Ok(result)
    }
}
