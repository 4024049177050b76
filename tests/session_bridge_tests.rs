//! Session Bridge Tests
//!
//! Drives full sessions through [`SessionBridge`] against an in-process fake
//! model, covering media relay, the tool-call round trip, output forwarding
//! and teardown.

mod mock_live;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use live_bridge::core::bridge::{BridgeError, ClientInbound, RelayExit, SessionOutcome};
use live_bridge::core::live::{ContentPart, LiveError, LiveEvent, MediaKind, ToolCallRequest};
use live_bridge::{
    ClientFrame, ClientOutgoing, ClientRoute, MemoryRecordStore, SessionBridge, default_registry,
};
use mock_live::{FakeConnector, FakeModel};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    client: mpsc::UnboundedSender<ClientFrame>,
    to_client: mpsc::Receiver<ClientRoute>,
    model: FakeModel,
    session: JoinHandle<SessionOutcome>,
}

fn client_stream() -> (mpsc::UnboundedSender<ClientFrame>, ClientInbound) {
    let (tx, rx) = mpsc::unbounded_channel();
    let inbound = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });
    (tx, Box::pin(inbound))
}

fn bridge_for(connector: Arc<FakeConnector>) -> SessionBridge {
    let tools = default_registry(Arc::new(MemoryRecordStore::new()), None);
    SessionBridge::new(connector, Arc::new(tools), Some("Be brief".to_string()))
}

fn start(connector: Arc<FakeConnector>, model: FakeModel) -> Harness {
    let bridge = bridge_for(connector);
    let (client, inbound) = client_stream();
    let (out_tx, to_client) = mpsc::channel(64);
    let session = tokio::spawn(async move { bridge.run(inbound, out_tx).await });

    Harness {
        client,
        to_client,
        model,
        session,
    }
}

fn text(value: Value) -> ClientFrame {
    ClientFrame::Text(value.to_string())
}

fn audio_frame(data: &str) -> ClientFrame {
    text(json!({
        "realtime_input": {
            "media_chunks": [{ "mime_type": "audio/pcm", "data": data }]
        }
    }))
}

fn tool_request(call_id: &str, tool_name: &str, arguments: Value) -> ToolCallRequest {
    let arguments: Map<String, Value> = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ToolCallRequest {
        call_id: call_id.to_string(),
        tool_name: tool_name.to_string(),
        arguments,
    }
}

async fn next_route(rx: &mut mpsc::Receiver<ClientRoute>) -> ClientRoute {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a client frame")
        .expect("client channel closed")
}

async fn finish(session: JoinHandle<SessionOutcome>) -> SessionOutcome {
    timeout(WAIT, session)
        .await
        .expect("session did not finish")
        .expect("session task panicked")
}

#[tokio::test]
async fn test_audio_chunk_forwarded_once() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();
    h.client.send(audio_frame("AAAAAA==")).unwrap();

    assert!(
        h.model
            .wait_until(WAIT, |r| !r.media.is_empty())
            .await
    );

    h.client.send(ClientFrame::Close).unwrap();
    let outcome = finish(h.session).await;

    match outcome {
        SessionOutcome::Completed {
            uplink,
            downlink,
            stats,
        } => {
            assert_eq!(uplink, RelayExit::ClientClosed);
            assert_eq!(downlink, RelayExit::Cancelled);
            assert_eq!(stats.media_forwarded, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let recorded = h.model.recorded();
    assert_eq!(recorded.media.len(), 1);
    assert_eq!(recorded.media[0].0, MediaKind::Audio);
    assert_eq!(recorded.media[0].1, Bytes::from_static(&[0, 0, 0, 0]));
    assert_eq!(recorded.close_calls, 1);

    assert_eq!(next_route(&mut h.to_client).await, ClientRoute::Close);
}

#[tokio::test]
async fn test_connect_config_carries_tools_and_options() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client
        .send(text(json!({
            "setup": { "generation_config": { "response_modalities": ["AUDIO"] } }
        })))
        .unwrap();

    assert!(
        h.model
            .wait_until(WAIT, |r| !r.configs.is_empty())
            .await
    );

    let config = h.model.recorded().configs.remove(0);
    assert_eq!(
        config.options.get("generation_config"),
        Some(&json!({ "response_modalities": ["AUDIO"] }))
    );
    let mut names: Vec<_> = config.tools.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["extract_id_info", "record_transaction"]);
    assert_eq!(config.system_instruction.as_deref(), Some("Be brief"));

    h.model.hang_up();
    let outcome = finish(h.session).await;
    assert!(matches!(
        outcome,
        SessionOutcome::Completed {
            downlink: RelayExit::ModelClosed,
            ..
        }
    ));
    drop(h.to_client);
}

#[tokio::test]
async fn test_failed_transaction_is_echoed_and_returned_to_model() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();
    h.model.emit(LiveEvent::ToolCallBatch(vec![tool_request(
        "c1",
        "record_transaction",
        json!({ "amount": "-10", "transaction_type": "expense" }),
    )]));

    let echo = match next_route(&mut h.to_client).await {
        ClientRoute::Outgoing(ClientOutgoing::Text(body)) => body,
        other => panic!("expected tool echo, got {other:?}"),
    };
    let echo: Value = serde_json::from_str(&echo).unwrap();
    assert_eq!(echo[0]["id"], "c1");
    assert_eq!(echo[0]["name"], "record_transaction");
    assert_eq!(echo[0]["response"]["result"]["recording_status"], "failed");

    assert!(
        h.model
            .wait_until(WAIT, |r| !r.tool_responses.is_empty())
            .await
    );
    let responses = h.model.recorded().tool_responses.remove(0);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, "c1");
    assert_eq!(
        responses[0].response["result"]["error"],
        "Amount must be a positive number"
    );

    h.model.hang_up();
    let outcome = finish(h.session).await;
    match outcome {
        SessionOutcome::Completed {
            uplink,
            downlink,
            stats,
        } => {
            assert_eq!(downlink, RelayExit::ModelClosed);
            assert_eq!(uplink, RelayExit::Cancelled);
            assert_eq!(stats.tool_calls, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_results_match_requests_in_order() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();
    h.model.emit(LiveEvent::ToolCallBatch(vec![
        tool_request(
            "a",
            "record_transaction",
            json!({ "amount": 12.5, "transaction_type": "income" }),
        ),
        tool_request("b", "does_not_exist", json!({})),
        tool_request("c", "extract_id_info", json!({ "name": "Ada" })),
    ]));

    assert!(
        h.model
            .wait_until(WAIT, |r| !r.tool_responses.is_empty())
            .await
    );
    let responses = h.model.recorded().tool_responses.remove(0);
    let ids: Vec<_> = responses.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    assert_eq!(responses[0].response["result"]["recording_status"], "success");
    assert_eq!(responses[1].response["result"]["status"], "error");
    assert_eq!(
        responses[1].response["result"]["error"],
        "Unknown tool: does_not_exist"
    );
    assert_eq!(responses[2].response["result"]["name"], "Ada");

    h.model.hang_up();
    finish(h.session).await;
    drop(h.to_client);
}

#[tokio::test]
async fn test_malformed_frame_does_not_end_session() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();
    h.client
        .send(ClientFrame::Text("not json at all".to_string()))
        .unwrap();
    h.client
        .send(text(json!({
            "realtime_input": {
                "media_chunks": [
                    { "mime_type": "video/mp4", "data": "AAAA" },
                    { "mime_type": "image/jpeg", "data": "AAAA" }
                ]
            }
        })))
        .unwrap();
    h.client.send(audio_frame("AAAAAA==")).unwrap();

    assert!(
        h.model
            .wait_until(WAIT, |r| r.media.len() == 2)
            .await
    );

    h.client.send(ClientFrame::Close).unwrap();
    match finish(h.session).await {
        SessionOutcome::Completed { uplink, stats, .. } => {
            assert_eq!(uplink, RelayExit::ClientClosed);
            assert_eq!(stats.frames_skipped, 1);
            assert_eq!(stats.chunks_dropped, 1);
            assert_eq!(stats.media_forwarded, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let kinds: Vec<_> = h.model.recorded().media.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Audio]);
}

#[tokio::test]
async fn test_model_output_forwarded_in_order() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();
    h.model.emit(LiveEvent::SetupComplete);
    h.model.emit(LiveEvent::Content(vec![
        ContentPart::Text("hello".to_string()),
        ContentPart::InlineData {
            mime_type: "audio/pcm;rate=24000".to_string(),
            data: Bytes::from_static(&[1, 2, 3]),
        },
    ]));
    h.model.emit(LiveEvent::Interrupted);
    h.model.emit(LiveEvent::TurnComplete);

    assert_eq!(
        next_route(&mut h.to_client).await,
        ClientRoute::Outgoing(ClientOutgoing::Text("hello".to_string()))
    );
    assert_eq!(
        next_route(&mut h.to_client).await,
        ClientRoute::Outgoing(ClientOutgoing::Audio("AQID".to_string()))
    );
    assert_eq!(
        next_route(&mut h.to_client).await,
        ClientRoute::Outgoing(ClientOutgoing::Interrupted(true))
    );
    assert_eq!(
        next_route(&mut h.to_client).await,
        ClientRoute::Outgoing(ClientOutgoing::TurnComplete(true))
    );

    h.model.hang_up();
    finish(h.session).await;
    assert_eq!(next_route(&mut h.to_client).await, ClientRoute::Close);
}

#[tokio::test]
async fn test_transport_error_tears_down_session() {
    let (connector, model) = FakeConnector::new();
    let h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();
    h.model
        .fail(LiveError::WebSocketError("connection reset".to_string()));

    match finish(h.session).await {
        SessionOutcome::Completed {
            uplink, downlink, ..
        } => {
            assert!(matches!(downlink, RelayExit::TransportError(_)));
            assert_eq!(uplink, RelayExit::Cancelled);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(h.model.recorded().close_calls, 1);
}

#[tokio::test]
async fn test_connect_failure_reports_error_to_client() {
    let (connector, model) = FakeConnector::failing("backend down");
    let mut h = start(connector, model);

    h.client.send(text(json!({ "setup": {} }))).unwrap();

    let outcome = finish(h.session).await;
    assert!(matches!(
        outcome,
        SessionOutcome::SetupFailed(BridgeError::Connect(_))
    ));

    match next_route(&mut h.to_client).await {
        ClientRoute::Outgoing(ClientOutgoing::Error(message)) => {
            assert!(message.contains("backend down"));
        }
        other => panic!("expected error frame, got {other:?}"),
    }
    assert_eq!(h.model.recorded().configs.len(), 1);
}

#[tokio::test]
async fn test_invalid_setup_reports_error_without_connecting() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client
        .send(ClientFrame::Text("{broken".to_string()))
        .unwrap();

    let outcome = finish(h.session).await;
    assert!(matches!(
        outcome,
        SessionOutcome::SetupFailed(BridgeError::InvalidSetup(_))
    ));
    assert!(matches!(
        next_route(&mut h.to_client).await,
        ClientRoute::Outgoing(ClientOutgoing::Error(_))
    ));
    assert!(h.model.recorded().configs.is_empty());
}

#[tokio::test]
async fn test_close_before_setup_never_connects() {
    let (connector, model) = FakeConnector::new();
    let mut h = start(connector, model);

    h.client.send(ClientFrame::Control).unwrap();
    h.client.send(ClientFrame::Close).unwrap();

    let outcome = finish(h.session).await;
    assert!(matches!(
        outcome,
        SessionOutcome::SetupFailed(BridgeError::ClientClosedBeforeSetup)
    ));
    assert!(h.model.recorded().configs.is_empty());
    // No error frame and no close route; the sender was dropped
    assert!(h.to_client.recv().await.is_none());
}
