use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::registry::{ToolHandler, ToolResult};
use super::{apply_storage_outcome, arg_string};
use crate::core::live::ToolDeclaration;
use crate::core::storage::{RecordStore, TRANSACTIONS_COLLECTION};

pub const RECORD_TRANSACTION: &str = "record_transaction";

const DEFAULT_CATEGORY: &str = "uncategorized";

/// Records an expense or income spoken by the user or read from a bill.
pub struct RecordTransactionTool {
    store: Arc<dyn RecordStore>,
    owner_id: Option<String>,
}

impl RecordTransactionTool {
    pub fn new(store: Arc<dyn RecordStore>, owner_id: Option<String>) -> Self {
        Self { store, owner_id }
    }
}

fn failed(error: &str) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert(
        "recording_status".to_string(),
        Value::String("failed".to_string()),
    );
    result.insert("error".to_string(), Value::String(error.to_string()));
    result
}

/// Parse a transaction amount. Must be a finite number greater than zero.
fn parse_amount(raw: &str) -> Result<f64, &'static str> {
    let amount: f64 = raw.trim().parse().map_err(|_| "Invalid amount format")?;
    if !amount.is_finite() {
        return Err("Invalid amount format");
    }
    if amount <= 0.0 {
        return Err("Amount must be a positive number");
    }
    Ok(amount)
}

#[async_trait]
impl ToolHandler for RecordTransactionTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: RECORD_TRANSACTION.to_string(),
            description: "Record a financial transaction (expense or income) from voice commands or bills. Examples: 'spent $20 on a movie', 'paid $50 for groceries', 'received $1000 salary'.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "amount": {
                        "type": "STRING",
                        "description": "The transaction amount (positive number, without currency symbol)"
                    },
                    "description": {
                        "type": "STRING",
                        "description": "Description of what the transaction was for (e.g., 'movie ticket', 'groceries', 'salary payment')"
                    },
                    "category": {
                        "type": "STRING",
                        "description": "Category of the transaction (e.g., entertainment, food, transportation, salary, freelance)"
                    },
                    "transaction_type": {
                        "type": "STRING",
                        "description": "Type of transaction: 'expense' for money spent or 'income' for money received"
                    },
                    "merchant": {
                        "type": "STRING",
                        "description": "Optional: Name of the business/merchant where the transaction occurred"
                    },
                    "payment_method": {
                        "type": "STRING",
                        "description": "Optional: Payment method used (cash, credit card, debit card, digital wallet, etc.)"
                    }
                },
                "required": ["amount", "description", "category", "transaction_type"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> ToolResult<Map<String, Value>> {
        let transaction_type = arg_string(&arguments, "transaction_type")
            .unwrap_or_default()
            .to_lowercase();
        if transaction_type != "expense" && transaction_type != "income" {
            return Ok(failed("Transaction type must be 'expense' or 'income'"));
        }

        let amount = match parse_amount(&arg_string(&arguments, "amount").unwrap_or_default()) {
            Ok(amount) => amount,
            Err(error) => return Ok(failed(error)),
        };

        let category = arg_string(&arguments, "category")
            .map(|c| c.to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let mut result = Map::new();
        result.insert("amount".to_string(), json!(amount));
        result.insert(
            "description".to_string(),
            Value::String(arg_string(&arguments, "description").unwrap_or_default()),
        );
        result.insert("category".to_string(), Value::String(category));
        result.insert(
            "transaction_type".to_string(),
            Value::String(transaction_type),
        );
        result.insert(
            "merchant".to_string(),
            arg_string(&arguments, "merchant")
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        result.insert(
            "payment_method".to_string(),
            arg_string(&arguments, "payment_method")
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        result.insert(
            "recording_status".to_string(),
            Value::String("success".to_string()),
        );

        let outcome = self
            .store
            .store(
                TRANSACTIONS_COLLECTION,
                result.clone(),
                self.owner_id.as_deref(),
            )
            .await;
        apply_storage_outcome(&mut result, outcome, RECORD_TRANSACTION);

        Ok(result)
    }
}
