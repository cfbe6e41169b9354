//! Realtime WebSocket handler
//!
//! Upgrades `GET /realtime/{agent_id}` to a WebSocket and runs one voice
//! session over it. The socket is wrapped as a [`LocalAudioChannel`]; the
//! session never sees WebSocket details.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::core::session::{AgentConfig, ChannelClosed, LocalAudioChannel, LocalInput, LocalOutput};
use crate::errors::AppResult;
use crate::state::{AppState, SessionSlot};

use super::messages::{
    MAX_TEXT_SIZE, RealtimeIncomingMessage, RealtimeMessageRoute, RealtimeOutgoingMessage,
};

/// Playback frames buffered for the socket writer (about 5 s at 20 ms frames)
const PLAYBACK_QUEUE_FRAMES: usize = 256;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Maximum idle time before the caller is considered gone
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the writer may take to flush on close
const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Realtime WebSocket handler
///
/// Looks up the agent and reserves a session slot before upgrading, so
/// unknown agents and a full server are reported as plain HTTP errors.
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    Path(agent_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Response> {
    let agent = state.lookup_agent(&agent_id).await?;
    let slot = state.reserve_slot()?;

    info!(agent_id = %agent_id, "Realtime WebSocket connection upgrade requested");

    Ok(ws
        .max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_realtime_socket(socket, state, agent, slot)))
}

/// Run one session over an upgraded socket
async fn handle_realtime_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    agent: AgentConfig,
    slot: SessionSlot,
) {
    let agent_id = agent.agent_id.clone();
    info!(%agent_id, "Realtime WebSocket connection established");

    let channel = WebSocketLocalChannel::new(socket);
    match app_state.run_session(slot, agent, Box::new(channel)).await {
        Ok(summary) => info!(
            %agent_id,
            session_id = %summary.session_id,
            final_state = %summary.final_state,
            duration_ms = summary.duration_ms,
            "Realtime WebSocket session finished"
        ),
        Err(e) => error!(%agent_id, "Failed to start session: {}", e),
    }
}

// =============================================================================
// WebSocket local channel
// =============================================================================

/// [`LocalAudioChannel`] over an axum WebSocket.
///
/// Writes go through a bounded queue drained by a writer task. Playback
/// frames carry a generation number; `ClearPlayback` bumps the generation
/// so frames queued before it are dropped by the writer instead of played.
pub struct WebSocketLocalChannel {
    receiver: SplitStream<WebSocket>,
    route_tx: Option<mpsc::Sender<RealtimeMessageRoute>>,
    writer: Option<JoinHandle<()>>,
    generation: Arc<AtomicU64>,
    dropped_frames: u64,
    /// Last audio or control message from the caller
    last_activity: Instant,
}

impl WebSocketLocalChannel {
    pub fn new(socket: WebSocket) -> Self {
        let (sender, receiver) = socket.split();
        let (route_tx, route_rx) = mpsc::channel(PLAYBACK_QUEUE_FRAMES);
        let generation = Arc::new(AtomicU64::new(0));
        let writer = tokio::spawn(write_loop(sender, route_rx, generation.clone()));

        Self {
            receiver,
            route_tx: Some(route_tx),
            writer: Some(writer),
            generation,
            dropped_frames: 0,
            last_activity: Instant::now(),
        }
    }

    fn queue_audio(&mut self, data: bytes::Bytes) -> Result<(), ChannelClosed> {
        let sender = self.route_tx.as_ref().ok_or(ChannelClosed)?;
        let route = RealtimeMessageRoute::Audio {
            generation: self.generation.load(Ordering::Acquire),
            data,
        };
        match sender.try_send(route) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                if self.dropped_frames.is_power_of_two() {
                    warn!(
                        dropped = self.dropped_frames,
                        "Playback queue full, dropping audio"
                    );
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ChannelClosed),
        }
    }
}

#[async_trait]
impl LocalAudioChannel for WebSocketLocalChannel {
    async fn recv(&mut self) -> Option<LocalInput> {
        if self.route_tx.is_none() {
            return None;
        }
        loop {
            // Pings and rejected messages do not count as activity
            let deadline = self.last_activity + IDLE_TIMEOUT;
            let next = match tokio::time::timeout_at(deadline, self.receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(
                        "Realtime WebSocket connection idle for {}s, closing",
                        IDLE_TIMEOUT.as_secs()
                    );
                    return None;
                }
            };

            match next {
                Some(Ok(Message::Binary(data))) => {
                    self.last_activity = Instant::now();
                    return Some(LocalInput::Audio(data));
                }
                Some(Ok(Message::Text(text))) => {
                    if text.as_str().len() > MAX_TEXT_SIZE {
                        warn!(size = text.as_str().len(), "Ignoring oversized text message");
                        continue;
                    }
                    match serde_json::from_str::<RealtimeIncomingMessage>(text.as_str()) {
                        Ok(message) => {
                            self.last_activity = Instant::now();
                            return Some(message.into());
                        }
                        Err(e) => {
                            warn!("Ignoring invalid client message: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Realtime WebSocket connection closed by client");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Realtime WebSocket error: {}", e);
                    return None;
                }
                None => return None,
            }
        }
    }

    async fn send(&mut self, output: LocalOutput) -> Result<(), ChannelClosed> {
        let output = match output {
            LocalOutput::Audio(data) => return self.queue_audio(data),
            LocalOutput::ClearPlayback => {
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(generation, "Clearing queued playback");
                LocalOutput::ClearPlayback
            }
            other => other,
        };

        let Some(message) = RealtimeOutgoingMessage::from_output(output) else {
            return Ok(());
        };
        let sender = self.route_tx.as_ref().ok_or(ChannelClosed)?;
        sender
            .send(RealtimeMessageRoute::Outgoing(message))
            .await
            .map_err(|_| ChannelClosed)
    }

    async fn close(&mut self) {
        if let Some(sender) = self.route_tx.take() {
            let _ = sender.send(RealtimeMessageRoute::Close).await;
        }
        if let Some(mut writer) = self.writer.take()
            && tokio::time::timeout(WRITER_CLOSE_TIMEOUT, &mut writer)
                .await
                .is_err()
        {
            warn!("WebSocket writer did not finish in time, aborting");
            writer.abort();
        }
    }
}

impl Drop for WebSocketLocalChannel {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

/// Socket writer: serializes messages and skips stale playback.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut route_rx: mpsc::Receiver<RealtimeMessageRoute>,
    generation: Arc<AtomicU64>,
) {
    let mut stale_frames: u64 = 0;

    while let Some(route) = route_rx.recv().await {
        let should_close = matches!(route, RealtimeMessageRoute::Close);

        let result = match route {
            RealtimeMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            },
            RealtimeMessageRoute::Audio {
                generation: frame_generation,
                data,
            } => {
                if frame_generation != generation.load(Ordering::Acquire) {
                    stale_frames += 1;
                    continue;
                }
                sender.send(Message::Binary(data)).await
            }
            RealtimeMessageRoute::Close => {
                info!("Closing realtime WebSocket connection");
                sender.send(Message::Close(None)).await
            }
        };

        if let Err(e) = result {
            debug!("Failed to send WebSocket message: {}", e);
            break;
        }

        if should_close {
            break;
        }
    }

    if stale_frames > 0 {
        debug!(stale_frames, "Dropped playback queued before a clear");
    }
}
