//! Tool registry and panic-isolated invocation.
//!
//! Handlers are registered once at startup; the registry is then shared
//! read-only by every session. [`ToolRegistry::invoke`] never fails: handler
//! errors, panics and unknown tool names all come back as a structured
//! `{"status": "error", "error": ...}` result.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::core::live::{FunctionResponse, ToolCallRequest, ToolDeclaration};

/// Errors a tool handler may return.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool panicked: {0}")]
    Panic(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// A locally executed function the model can call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Schema announced to the model at session setup.
    fn declaration(&self) -> ToolDeclaration;

    /// Execute one call. Domain failures belong in the returned map.
    async fn call(&self, arguments: Map<String, Value>) -> ToolResult<Map<String, Value>>;
}

/// Outcome of one tool call, correlated with its request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub call_id: String,
    pub tool_name: String,
    pub result: Map<String, Value>,
}

impl ToolCallResult {
    /// True when the registry itself reported a failure.
    pub fn is_error(&self) -> bool {
        self.result.get("status").and_then(Value::as_str) == Some("error")
    }

    /// Wire form sent back to the model: `{name, response: {result}, id}`.
    pub fn into_function_response(self) -> FunctionResponse {
        FunctionResponse {
            name: self.tool_name,
            response: json!({ "result": Value::Object(self.result) }),
            id: self.call_id,
        }
    }
}

/// Name-indexed set of tool handlers.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Registration order, used for stable declarations
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its declared name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.declaration().name;
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        } else {
            self.order.push(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Declarations of every registered tool, in registration order.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.declaration())
            .collect()
    }

    /// Execute one request. Never fails past this boundary.
    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolCallResult {
        let outcome = match self.handlers.get(&request.tool_name) {
            Some(handler) => call_tool_safely(handler.as_ref(), request.arguments.clone()).await,
            None => Err(ToolError::UnknownTool(request.tool_name.clone())),
        };

        let result = match outcome {
            Ok(result) => {
                tracing::debug!(
                    tool = %request.tool_name,
                    call_id = %request.call_id,
                    "Tool call completed"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    tool = %request.tool_name,
                    call_id = %request.call_id,
                    error = %e,
                    "Tool call failed"
                );
                error_result(&e)
            }
        };

        ToolCallResult {
            call_id: request.call_id.clone(),
            tool_name: request.tool_name.clone(),
            result,
        }
    }

    /// Execute a whole batch in arrival order, one result per request.
    pub async fn invoke_batch(&self, requests: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.invoke(request).await);
        }
        results
    }
}

fn error_result(error: &ToolError) -> Map<String, Value> {
    let message = match error {
        ToolError::UnknownTool(name) => format!("Unknown tool: {name}"),
        other => other.to_string(),
    };
    let mut result = Map::new();
    result.insert("status".to_string(), Value::String("error".to_string()));
    result.insert("error".to_string(), Value::String(message));
    result
}

/// Run a handler, converting panics during polling into [`ToolError::Panic`].
async fn call_tool_safely(
    handler: &dyn ToolHandler,
    arguments: Map<String, Value>,
) -> ToolResult<Map<String, Value>> {
    match AssertUnwindSafe(handler.call(arguments)).catch_unwind().await {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = extract_panic_message(&panic_info);
            tracing::error!(message = %msg, "Tool handler panicked");
            Err(ToolError::Panic(msg))
        }
    }
}

/// Extract a human-readable message from panic info.
pub(crate) fn extract_panic_message(panic_info: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic (non-string payload)".to_string()
    }
}
