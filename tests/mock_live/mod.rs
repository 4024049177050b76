//! In-process fake of a live model backend.
//!
//! [`FakeConnector`] hands out one scripted session: events are pushed by the
//! test through [`FakeModel`], and everything the bridge sends to the model
//! is recorded for assertions.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::sync::mpsc;

use live_bridge::core::live::{
    FunctionResponse, LiveConfig, LiveConnector, LiveError, LiveEvent, LiveResult, LiveSession,
    LiveSink, MediaKind,
};

/// Everything the bridge sent to the fake model.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub configs: Vec<LiveConfig>,
    pub media: Vec<(MediaKind, Bytes)>,
    pub tool_responses: Vec<Vec<FunctionResponse>>,
    pub close_calls: usize,
}

type EventReceiver = mpsc::UnboundedReceiver<LiveResult<LiveEvent>>;

pub struct FakeConnector {
    recorded: Arc<Mutex<Recorded>>,
    events: Mutex<Option<EventReceiver>>,
    connect_error: Option<String>,
}

/// Test-side handle on the fake model session.
pub struct FakeModel {
    tx: Option<mpsc::UnboundedSender<LiveResult<LiveEvent>>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, FakeModel) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let connector = Arc::new(Self {
            recorded: recorded.clone(),
            events: Mutex::new(Some(rx)),
            connect_error: None,
        });
        (
            connector,
            FakeModel {
                tx: Some(tx),
                recorded,
            },
        )
    }

    /// A connector whose `connect` always fails.
    pub fn failing(message: &str) -> (Arc<Self>, FakeModel) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let connector = Arc::new(Self {
            recorded: recorded.clone(),
            events: Mutex::new(Some(rx)),
            connect_error: Some(message.to_string()),
        });
        (
            connector,
            FakeModel {
                tx: Some(tx),
                recorded,
            },
        )
    }
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn connect(&self, config: LiveConfig) -> LiveResult<LiveSession> {
        self.recorded.lock().unwrap().configs.push(config);

        if let Some(message) = &self.connect_error {
            return Err(LiveError::ConnectionFailed(message.clone()));
        }

        let rx = self
            .events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| LiveError::ConnectionFailed("session already opened".to_string()))?;

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(LiveSession {
            sink: Box::new(FakeSink {
                recorded: self.recorded.clone(),
            }),
            events: Box::pin(events),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

struct FakeSink {
    recorded: Arc<Mutex<Recorded>>,
}

#[async_trait]
impl LiveSink for FakeSink {
    async fn send_media(&mut self, kind: MediaKind, data: Bytes) -> LiveResult<()> {
        self.recorded.lock().unwrap().media.push((kind, data));
        Ok(())
    }

    async fn send_tool_response(&mut self, responses: Vec<FunctionResponse>) -> LiveResult<()> {
        self.recorded.lock().unwrap().tool_responses.push(responses);
        Ok(())
    }

    async fn close(&mut self) -> LiveResult<()> {
        self.recorded.lock().unwrap().close_calls += 1;
        Ok(())
    }
}

impl FakeModel {
    /// Queue an event for the bridge.
    pub fn emit(&self, event: LiveEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Ok(event));
        }
    }

    /// Queue a stream error for the bridge.
    pub fn fail(&self, error: LiveError) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Err(error));
        }
    }

    /// End the event stream once queued events are consumed.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }

    /// Poll until `check` holds or the timeout elapses.
    pub async fn wait_until<F>(&self, timeout: Duration, check: F) -> bool
    where
        F: Fn(&Recorded) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let done = check(&self.recorded.lock().unwrap().clone());
            if done {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
