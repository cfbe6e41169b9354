//! Shared fakes for integration tests
//!
//! - [`FakeRealtime`]: an in-process upstream whose events are pushed by the
//!   test and whose outbound traffic is recorded
//! - [`ScriptedExecutor`]: a tool executor with canned results and delays

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use voice_agent_bridge::core::realtime::{
    BaseRealtime, ControlEvent, ModelEvent, RealtimeError, RealtimeResult,
};
use voice_agent_bridge::core::session::LocalOutput;
use voice_agent_bridge::core::tools::{ToolExecutionError, ToolExecutor, ToolRequest};

/// PCM16 bytes in one 20 ms frame at 24 kHz
pub const FRAME_BYTES: usize = 960;

/// Something the session sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Control(ControlEvent),
    Audio(usize),
}

impl Sent {
    pub fn is_audio(&self) -> bool {
        matches!(self, Sent::Audio(_))
    }
}

// =============================================================================
// Fake upstream
// =============================================================================

/// Test side of a [`FakeRealtime`].
pub struct UpstreamScript {
    events: Option<mpsc::Sender<ModelEvent>>,
    sent: Arc<Mutex<Vec<Sent>>>,
    ready: Arc<AtomicBool>,
    disconnects: Arc<AtomicUsize>,
}

impl UpstreamScript {
    pub async fn push(&self, event: ModelEvent) {
        self.events
            .as_ref()
            .expect("upstream already hung up")
            .send(event)
            .await
            .expect("session stopped reading upstream events");
    }

    /// End the upstream event stream, as if the model closed the channel.
    pub fn hang_up(&mut self) {
        self.events = None;
    }

    /// Acknowledge the session so `connect` completes.
    pub async fn accept(&self) {
        self.push(ModelEvent::SessionCreated {
            session_id: "upstream-1".to_string(),
        })
        .await;
        self.push(ModelEvent::SessionReady).await;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn controls(&self) -> Vec<ControlEvent> {
        self.sent
            .lock()
            .iter()
            .filter_map(|sent| match sent {
                Sent::Control(event) => Some(event.clone()),
                Sent::Audio(_) => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.controls().iter().filter(|c| c.name() == name).count()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// In-process [`BaseRealtime`] driven by an [`UpstreamScript`].
pub struct FakeRealtime {
    events: Option<mpsc::Receiver<ModelEvent>>,
    sent: Arc<Mutex<Vec<Sent>>>,
    ready: Arc<AtomicBool>,
    disconnects: Arc<AtomicUsize>,
    /// Never finish connecting
    stall: bool,
}

impl FakeRealtime {
    pub fn pair() -> (Self, UpstreamScript) {
        let (tx, rx) = mpsc::channel(256);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ready = Arc::new(AtomicBool::new(false));
        let disconnects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                events: Some(rx),
                sent: sent.clone(),
                ready: ready.clone(),
                disconnects: disconnects.clone(),
                stall: false,
            },
            UpstreamScript {
                events: Some(tx),
                sent,
                ready,
                disconnects,
            },
        )
    }

    /// An upstream whose `connect` never returns.
    pub fn stalled() -> (Self, UpstreamScript) {
        let (mut fake, script) = Self::pair();
        fake.stall = true;
        (fake, script)
    }
}

#[async_trait]
impl BaseRealtime for FakeRealtime {
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<ModelEvent>> {
        if self.stall {
            std::future::pending::<()>().await;
        }
        let events = self
            .events
            .take()
            .ok_or_else(|| RealtimeError::ConnectionFailed("already connected".to_string()))?;
        self.ready.store(true, Ordering::Release);
        Ok(events)
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.ready.store(false, Ordering::Release);
        self.disconnects.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn send_audio(&mut self, audio_data: Bytes) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.sent.lock().push(Sent::Audio(audio_data.len()));
        Ok(())
    }

    async fn send_control(&mut self, event: ControlEvent) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.sent.lock().push(Sent::Control(event));
        Ok(())
    }
}

// =============================================================================
// Tool executor
// =============================================================================

/// Tool executor with per-tool canned results and an optional delay.
#[derive(Default)]
pub struct ScriptedExecutor {
    results: HashMap<String, Result<Value, ToolExecutionError>>,
    delay: Duration,
    calls: Mutex<Vec<ToolRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, tool: &str, result: Value) -> Self {
        self.results.insert(tool.to_string(), Ok(result));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ToolRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute(&self, request: ToolRequest) -> Result<Value, ToolExecutionError> {
        self.calls.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.results
            .get(&request.tool_name)
            .cloned()
            .unwrap_or_else(|| Err(ToolExecutionError::Executor("no such tool".to_string())))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// One frame of silence at the local rate.
pub fn silence_frame() -> Bytes {
    Bytes::from(vec![0u8; FRAME_BYTES])
}

/// Agent audio of `frames` local frames, every byte set to `fill`.
pub fn agent_audio(frames: usize, response_id: &str, fill: u8) -> ModelEvent {
    ModelEvent::OutputAudio {
        audio: Bytes::from(vec![fill; FRAME_BYTES * frames]),
        response_id: Some(response_id.to_string()),
    }
}

/// Wait for the next local output matching `pred`, skipping the rest.
pub async fn next_matching(
    output: &mut mpsc::Receiver<LocalOutput>,
    pred: impl Fn(&LocalOutput) -> bool,
) -> LocalOutput {
    let wait = async {
        loop {
            match output.recv().await {
                Some(out) if pred(&out) => return out,
                Some(_) => {}
                None => panic!("local output closed before the expected message"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for local output")
}

/// Poll until `cond` holds.
pub async fn eventually(cond: impl Fn() -> bool) {
    let wait = async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not met in time");
}
