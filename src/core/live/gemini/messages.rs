//! Gemini Live wire messages.
//!
//! Client messages are externally tagged (`{"setup": ...}`, `{"realtimeInput": ...}`,
//! `{"toolResponse": ...}`). Server messages carry one or more optional top-level
//! fields and are flattened into [`LiveEvent`]s in a fixed order.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::config::{GeminiLiveConfig, INPUT_AUDIO_MIME_TYPE, INPUT_IMAGE_MIME_TYPE};
use crate::core::live::base::{
    ContentPart, FunctionResponse, LiveConfig, LiveEvent, MediaKind, ToolCallRequest,
};

/// Setup keys the caller may not override.
const RESERVED_SETUP_KEYS: [&str; 4] = ["model", "tools", "system_instruction", "systemInstruction"];

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent to the Gemini Live endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Map<String, Value>),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Blob>,
}

/// Inline media payload, base64 encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

impl ClientMessage {
    /// Build the realtime input message for one media chunk.
    pub fn media(kind: MediaKind, data: &[u8]) -> Self {
        let encoded = BASE64_STANDARD.encode(data);
        let input = match kind {
            MediaKind::Audio => RealtimeInput {
                audio: Some(Blob {
                    mime_type: INPUT_AUDIO_MIME_TYPE.to_string(),
                    data: encoded,
                }),
                video: None,
            },
            MediaKind::Image => RealtimeInput {
                audio: None,
                video: Some(Blob {
                    mime_type: INPUT_IMAGE_MIME_TYPE.to_string(),
                    data: encoded,
                }),
            },
        };
        ClientMessage::RealtimeInput(input)
    }

    pub fn tool_response(responses: Vec<FunctionResponse>) -> Self {
        ClientMessage::ToolResponse(ToolResponse {
            function_responses: responses,
        })
    }
}

/// Merge caller options with the server-controlled model, tools and instruction.
pub fn build_setup(connector: &GeminiLiveConfig, config: LiveConfig) -> ClientMessage {
    let LiveConfig {
        mut options,
        tools,
        system_instruction,
    } = config;

    for key in RESERVED_SETUP_KEYS {
        options.remove(key);
    }

    options.insert(
        "model".to_string(),
        Value::String(connector.model_resource()),
    );

    if !tools.is_empty() {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        options.insert(
            "tools".to_string(),
            json!([{ "functionDeclarations": declarations }]),
        );
    }

    if let Some(text) = system_instruction {
        options.insert(
            "systemInstruction".to_string(),
            json!({ "parts": [{ "text": text }] }),
        );
    }

    ClientMessage::Setup(options)
}

// =============================================================================
// Server Messages
// =============================================================================

/// One message received from the Gemini Live endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    #[serde(default)]
    pub go_away: Option<Value>,
    #[serde(default)]
    pub usage_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

impl ServerMessage {
    /// True when the message only carries token accounting.
    pub fn is_usage_only(&self) -> bool {
        self.usage_metadata.is_some()
            && self.setup_complete.is_none()
            && self.server_content.is_none()
            && self.tool_call.is_none()
            && self.tool_call_cancellation.is_none()
            && self.go_away.is_none()
    }

    /// Flatten into events, content before the turn-complete marker.
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(LiveEvent::SetupComplete);
        }

        if let Some(tool_call) = self.tool_call {
            let requests = tool_call
                .function_calls
                .into_iter()
                .map(|call| ToolCallRequest {
                    call_id: call.id.unwrap_or_default(),
                    tool_name: call.name,
                    arguments: call.args.unwrap_or_default(),
                })
                .collect();
            events.push(LiveEvent::ToolCallBatch(requests));
        }

        if let Some(cancellation) = self.tool_call_cancellation {
            events.push(LiveEvent::ToolCallCancellation(cancellation.ids));
        }

        if let Some(content) = self.server_content {
            let parts: Vec<ContentPart> = content
                .model_turn
                .map(|turn| turn.parts)
                .unwrap_or_default()
                .into_iter()
                .filter_map(decode_part)
                .collect();

            if !parts.is_empty() {
                events.push(LiveEvent::Content(parts));
            }
            if content.interrupted {
                events.push(LiveEvent::Interrupted);
            }
            if content.turn_complete {
                events.push(LiveEvent::TurnComplete);
            }
        }

        if self.go_away.is_some() {
            events.push(LiveEvent::GoAway);
        }

        events
    }
}

fn decode_part(part: Part) -> Option<ContentPart> {
    if let Some(text) = part.text {
        return Some(ContentPart::Text(text));
    }
    let inline = part.inline_data?;
    match BASE64_STANDARD.decode(inline.data.as_bytes()) {
        Ok(data) => Some(ContentPart::InlineData {
            mime_type: inline.mime_type,
            data: Bytes::from(data),
        }),
        Err(e) => {
            tracing::warn!(
                mime_type = %inline.mime_type,
                "Dropping undecodable inline data part: {}",
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::live::base::ToolDeclaration;

    #[test]
    fn test_audio_media_message() {
        let msg = ClientMessage::media(MediaKind::Audio, &[0, 0, 0, 0]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({"realtimeInput": {"audio": {"mimeType": "audio/pcm;rate=16000", "data": "AAAAAA=="}}})
        );
    }

    #[test]
    fn test_image_media_message() {
        let msg = ClientMessage::media(MediaKind::Image, b"jpg");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["realtimeInput"]["video"]["mimeType"], "image/jpeg");
        assert!(json["realtimeInput"].get("audio").is_none());
    }

    #[test]
    fn test_tool_response_message() {
        let msg = ClientMessage::tool_response(vec![FunctionResponse {
            name: "extract_id_info".to_string(),
            response: json!({"result": {"extraction_status": "success"}}),
            id: "call-1".to_string(),
        }]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["toolResponse"]["functionResponses"][0]["id"], "call-1");
        assert_eq!(
            json["toolResponse"]["functionResponses"][0]["response"]["result"]["extraction_status"],
            "success"
        );
    }

    #[test]
    fn test_build_setup_overrides_reserved_keys() {
        let connector = GeminiLiveConfig {
            api_key: "k".to_string(),
            ..Default::default()
        };
        let mut options = Map::new();
        options.insert("model".into(), json!("models/other"));
        options.insert("tools".into(), json!([{"functionDeclarations": []}]));
        options.insert("system_instruction".into(), json!("ignore me"));
        options.insert(
            "generation_config".into(),
            json!({"response_modalities": ["AUDIO"]}),
        );

        let config = LiveConfig {
            options,
            tools: vec![ToolDeclaration {
                name: "record_transaction".into(),
                description: "Record".into(),
                parameters: json!({"type": "OBJECT"}),
            }],
            system_instruction: Some("Be helpful".into()),
        };

        let ClientMessage::Setup(setup) = build_setup(&connector, config) else {
            panic!("Expected setup message");
        };
        assert_eq!(setup["model"], "models/gemini-2.0-flash-exp");
        assert_eq!(
            setup["tools"][0]["functionDeclarations"][0]["name"],
            "record_transaction"
        );
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be helpful");
        assert!(setup.get("system_instruction").is_none());
        assert_eq!(
            setup["generation_config"]["response_modalities"][0],
            "AUDIO"
        );
    }

    #[test]
    fn test_parse_setup_complete() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(msg.into_events(), vec![LiveEvent::SetupComplete]);
    }

    #[test]
    fn test_parse_content_then_turn_complete() {
        let raw = r#"{"serverContent": {"modelTurn": {"parts": [{"text": "hello"}, {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAE="}}]}, "turnComplete": true}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let events = msg.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            LiveEvent::Content(vec![
                ContentPart::Text("hello".into()),
                ContentPart::InlineData {
                    mime_type: "audio/pcm;rate=24000".into(),
                    data: Bytes::from_static(&[0, 1]),
                },
            ])
        );
        assert_eq!(events[1], LiveEvent::TurnComplete);
    }

    #[test]
    fn test_parse_tool_call() {
        let raw = r#"{"toolCall": {"functionCalls": [{"id": "c1", "name": "record_transaction", "args": {"amount": "-10"}}, {"name": "noop"}]}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let events = msg.into_events();
        let LiveEvent::ToolCallBatch(requests) = &events[0] else {
            panic!("Expected tool call batch");
        };
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].call_id, "c1");
        assert_eq!(requests[0].arguments["amount"], "-10");
        assert_eq!(requests[1].call_id, "");
        assert!(requests[1].arguments.is_empty());
    }

    #[test]
    fn test_parse_interrupted_and_cancellation() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert_eq!(msg.into_events(), vec![LiveEvent::Interrupted]);

        let msg: ServerMessage =
            serde_json::from_str(r#"{"toolCallCancellation": {"ids": ["a", "b"]}}"#).unwrap();
        assert_eq!(
            msg.into_events(),
            vec![LiveEvent::ToolCallCancellation(vec!["a".into(), "b".into()])]
        );
    }

    #[test]
    fn test_usage_only_message() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"usageMetadata": {"totalTokenCount": 10}}"#).unwrap();
        assert!(msg.is_usage_only());
        assert!(msg.into_events().is_empty());
    }

    #[test]
    fn test_undecodable_inline_data_is_dropped() {
        let raw = r#"{"serverContent": {"modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm", "data": "!!!"}}]}}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.into_events().is_empty());
    }
}
