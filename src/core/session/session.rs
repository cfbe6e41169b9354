//! The per-call session.
//!
//! One [`VoiceSession`] owns the local channel, the upstream provider and the
//! four collaborators (audio pipeline, transcript aggregator, turn controller,
//! tool dispatcher). A single task runs it, so upstream events are handled
//! strictly in arrival order and every state change is serialized.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::channel::{BoxedLocalChannel, LocalInput, LocalOutput};
use super::config::{AgentConfig, SessionOptions};
use super::error::{ProtocolError, SessionError, SessionResult};
use super::sink::{CallSummary, SharedTranscriptSink};
use super::state::{SessionState, StateMachine};
use crate::core::audio::{AudioFormat, AudioFrame, AudioPipeline};
use crate::core::realtime::{BoxedRealtime, ControlEvent, ModelEvent, SessionSettings};
use crate::core::tools::{SharedToolExecutor, ToolDispatcher, ToolOutcome};
use crate::core::transcript::{Speaker, TranscriptAggregator, TranscriptEntry, TranscriptFragment};
use crate::core::turn::{SpeechSource, TurnAction, TurnController};

/// Transcript batches queued for the sink; batches beyond this are dropped.
const SINK_QUEUE_CAPACITY: usize = 64;

/// System transcript entry for any upstream error; the code stays in the logs.
const UPSTREAM_ERROR_ENTRY: &str = "the agent reported an error";

/// How long close waits for the sink to catch up.
const SINK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Caller hung up
    Hangup,
    /// Local channel went away
    LocalClosed,
    /// Upstream closed its channel
    UpstreamClosed,
    /// Server is shutting down or the session was cancelled
    Shutdown,
    /// Upstream reported a fatal error
    Fatal(String),
    /// Sending on a channel failed
    Transport(String),
    /// The session never became ready
    Failed(String),
}

impl CloseReason {
    /// Short code sent to the caller side; never carries upstream payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CloseReason::Hangup => "hangup",
            CloseReason::LocalClosed => "local_closed",
            CloseReason::UpstreamClosed => "upstream_closed",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Fatal(_) => "agent_error",
            CloseReason::Transport(_) => "transport_error",
            CloseReason::Failed(_) => "unavailable",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Hangup => write!(f, "caller hung up"),
            CloseReason::LocalClosed => write!(f, "local channel closed"),
            CloseReason::UpstreamClosed => write!(f, "upstream closed"),
            CloseReason::Shutdown => write!(f, "shutdown"),
            CloseReason::Fatal(msg) => write!(f, "fatal upstream error: {msg}"),
            CloseReason::Transport(msg) => write!(f, "transport error: {msg}"),
            CloseReason::Failed(msg) => write!(f, "failed to start: {msg}"),
        }
    }
}

/// External collaborators a session needs.
pub struct SessionDeps {
    pub upstream: BoxedRealtime,
    pub executor: SharedToolExecutor,
    pub sink: SharedTranscriptSink,
}

/// Registry view of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub agent_id: String,
    pub started_at: OffsetDateTime,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Ask the session to close. Closing is idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the session reaches a terminal state.
    pub async fn closed(&mut self) {
        let _ = self.state.wait_for(|state| state.is_terminal()).await;
    }
}

enum SinkMessage {
    Append(Vec<TranscriptEntry>),
    Ended(CallSummary),
}

/// One call, from connect to teardown.
pub struct VoiceSession {
    id: String,
    agent: AgentConfig,
    options: SessionOptions,
    machine: StateMachine,
    local: BoxedLocalChannel,
    upstream: BoxedRealtime,
    pipeline: AudioPipeline,
    turn: TurnController,
    tools: ToolDispatcher,
    transcript: TranscriptAggregator,
    sink: SharedTranscriptSink,
    sink_tx: Option<mpsc::Sender<SinkMessage>>,
    sink_task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    started_at: OffsetDateTime,
    started: Instant,
    upstream_session_id: Option<String>,
    /// Response whose audio is currently playing
    current_response: Option<String>,
    /// Set by barge-in until the cancelled response is over
    discard_output: bool,
    cancelled_response: Option<String>,
    tool_calls: u64,
    malformed_frames: u64,
    entries_emitted: usize,
    sink_dropped: usize,
}

impl VoiceSession {
    pub fn new(
        session_id: impl Into<String>,
        agent: AgentConfig,
        options: SessionOptions,
        local: BoxedLocalChannel,
        deps: SessionDeps,
    ) -> SessionResult<Self> {
        agent.validate()?;
        options.validate()?;

        let id = session_id.into();
        let pipeline = AudioPipeline::new(
            AudioFormat::mono(options.local_sample_rate),
            AudioFormat::mono(options.upstream_sample_rate),
            options.frame_ms,
        )?;
        let turn = TurnController::new(agent.turn_settings(options.frame_ms));
        let tools = ToolDispatcher::new(
            agent.agent_id.clone(),
            agent.enabled_tool_names(),
            deps.executor,
            options.tool_timeout,
        );
        let transcript = TranscriptAggregator::new(options.coalesce_window);

        Ok(Self {
            machine: StateMachine::new(id.clone()),
            id,
            agent,
            options,
            local,
            upstream: deps.upstream,
            pipeline,
            turn,
            tools,
            transcript,
            sink: deps.sink,
            sink_tx: None,
            sink_task: None,
            cancel: CancellationToken::new(),
            started_at: OffsetDateTime::now_utc(),
            started: Instant::now(),
            upstream_session_id: None,
            current_response: None,
            discard_output: false,
            cancelled_response: None,
            tool_calls: 0,
            malformed_frames: 0,
            entries_emitted: 0,
            sink_dropped: 0,
        })
    }

    /// Tie the session to an outer cancellation token (e.g. server shutdown).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.machine.current()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.id.clone(),
            agent_id: self.agent.agent_id.clone(),
            started_at: self.started_at,
            state: self.machine.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Drive the call to completion and return its summary.
    pub async fn run(self) -> CallSummary {
        let span = info_span!("session", session_id = %self.id, agent_id = %self.agent.agent_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> CallSummary {
        info!("Session starting");
        let cancel = self.cancel.clone();

        let connected = tokio::select! {
            result = self.connect() => result,
            _ = cancel.cancelled() => Err(SessionError::Transport("cancelled while connecting".to_string())),
        };
        let events = match connected {
            Ok(events) => events,
            Err(e) => return self.fail(e).await,
        };

        self.set_state(SessionState::Ready);
        self.start_sink_forwarder();

        let ready = LocalOutput::Ready {
            session_id: self.id.clone(),
        };
        if self.local.send(ready).await.is_err() {
            return self.close(CloseReason::LocalClosed).await;
        }

        self.set_state(SessionState::Active);
        info!(upstream_session_id = ?self.upstream_session_id, "Session active");
        let reason = self.event_loop(events).await;
        self.close(reason).await
    }

    // =========================================================================
    // Connecting
    // =========================================================================

    /// Open the upstream, send the session configuration and wait for the
    /// acknowledgement, all within the connect timeout.
    async fn connect(&mut self) -> SessionResult<mpsc::Receiver<ModelEvent>> {
        let timeout = self.options.connect_timeout;
        let settings = self.agent.session_settings();
        let mut upstream_session_id = None;

        let result = tokio::time::timeout(
            timeout,
            open_upstream(&mut self.upstream, settings, &mut upstream_session_id),
        )
        .await;

        self.upstream_session_id = upstream_session_id;
        match result {
            Ok(events) => events,
            Err(_) => Err(SessionError::ConnectTimeout(timeout)),
        }
    }

    async fn fail(mut self, error: SessionError) -> CallSummary {
        error!(error = %error, "Session failed");
        let reason = CloseReason::Failed(error.to_string());
        self.set_state(SessionState::Failed);

        let closing = LocalOutput::Closing {
            reason: reason.code().to_string(),
        };
        let _ = self.local.send(closing).await;
        self.local.close().await;
        if let Err(e) = self.upstream.disconnect().await {
            debug!(error = %e, "Upstream disconnect after failure");
        }

        self.summary(SessionState::Failed, &reason)
    }

    // =========================================================================
    // Active
    // =========================================================================

    async fn event_loop(&mut self, mut events: mpsc::Receiver<ModelEvent>) -> CloseReason {
        loop {
            let deadline = self.transcript.next_deadline();
            let flush_at = deadline.unwrap_or_else(Instant::now);

            // Upstream events win over local input so that anything the
            // model already sent is handled before a hangup closes the call.
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return CloseReason::Shutdown,

                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Upstream event stream ended");
                        return CloseReason::UpstreamClosed;
                    };
                    if let Some(reason) = self.on_model_event(event).await {
                        return reason;
                    }
                }

                Some(outcome) = self.tools.next_outcome(), if self.tools.has_pending() => {
                    if let Some(reason) = self.on_tool_outcome(outcome).await {
                        return reason;
                    }
                }

                input = self.local.recv() => {
                    let Some(input) = input else {
                        info!("Local channel ended");
                        return CloseReason::LocalClosed;
                    };
                    if let Some(reason) = self.on_local_input(input).await {
                        return reason;
                    }
                }

                _ = tokio::time::sleep_until(flush_at), if deadline.is_some() => {
                    self.transcript.expire(Instant::now());
                    self.emit_transcript().await;
                }
            }
        }
    }

    async fn on_model_event(&mut self, event: ModelEvent) -> Option<CloseReason> {
        trace!(event = event.name(), "Upstream event");
        match event {
            ModelEvent::SessionCreated { session_id } => {
                self.upstream_session_id = Some(session_id);
            }
            ModelEvent::SessionReady => debug!("Session configuration acknowledged"),
            ModelEvent::SpeechStarted { audio_start_ms } => {
                debug!(?audio_start_ms, "Upstream detected caller speech");
                return self.on_speech_started(SpeechSource::Upstream).await;
            }
            ModelEvent::SpeechStopped => trace!("Caller speech stopped"),
            ModelEvent::InputTranscript { text, is_final } => {
                self.ingest(Speaker::Caller, text, is_final).await;
            }
            ModelEvent::OutputAudio { audio, response_id } => {
                return self.on_output_audio(audio, response_id).await;
            }
            ModelEvent::OutputAudioDone => return self.flush_playback().await,
            ModelEvent::OutputTranscript { text, is_final } => {
                if !self.discard_output {
                    self.turn.on_agent_output();
                }
                self.ingest(Speaker::Agent, text, is_final).await;
            }
            ModelEvent::FunctionCallRequest {
                call_id,
                tool_name,
                arguments,
            } => {
                self.tool_calls += 1;
                info!(%call_id, %tool_name, "Function call requested");
                if let Err(e) = self
                    .tools
                    .on_function_call_request(&call_id, &tool_name, &arguments)
                {
                    return self.on_protocol_error(e).await;
                }
            }
            ModelEvent::ResponseComplete {
                response_id,
                status,
            } => {
                debug!(?response_id, ?status, "Response complete");
                self.turn.on_response_done();
                self.discard_output = false;
                self.cancelled_response = None;
                self.current_response = None;
                return self.flush_playback().await;
            }
            ModelEvent::Error {
                code,
                message,
                fatal,
            } => {
                return self
                    .on_protocol_error(ProtocolError::Upstream {
                        code,
                        message,
                        fatal,
                    })
                    .await;
            }
        }
        None
    }

    async fn on_output_audio(
        &mut self,
        audio: Bytes,
        response_id: Option<String>,
    ) -> Option<CloseReason> {
        if self.discard_output {
            let stale = match (&response_id, &self.cancelled_response) {
                (Some(id), Some(cancelled)) => id == cancelled,
                _ => true,
            };
            if stale {
                trace!("Dropping audio from cancelled response");
                return None;
            }
            self.discard_output = false;
            self.cancelled_response = None;
        }
        if response_id.is_some() {
            self.current_response = response_id;
        }

        self.turn.on_agent_output();
        match self.pipeline.downlink.push(&audio) {
            Ok(frames) => {
                for frame in frames {
                    if self.local.send(LocalOutput::Audio(frame)).await.is_err() {
                        return Some(CloseReason::LocalClosed);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Dropping malformed upstream audio"),
        }
        None
    }

    async fn flush_playback(&mut self) -> Option<CloseReason> {
        match self.pipeline.downlink.flush() {
            Ok(Some(frame)) => {
                if self.local.send(LocalOutput::Audio(frame)).await.is_err() {
                    return Some(CloseReason::LocalClosed);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to flush playback"),
        }
        None
    }

    async fn on_local_input(&mut self, input: LocalInput) -> Option<CloseReason> {
        match input {
            LocalInput::Audio(wire) => match self.pipeline.uplink.decode(&wire) {
                Ok(frame) => {
                    if let Some(frame) = self.turn.on_caller_frame(frame) {
                        return self.forward_upstream(&frame).await;
                    }
                }
                Err(e) => {
                    self.malformed_frames += 1;
                    warn!(
                        error = %e,
                        len = wire.len(),
                        dropped = self.malformed_frames,
                        "Dropping malformed caller frame"
                    );
                }
            },
            LocalInput::SpeechStarted => {
                return self.on_speech_started(SpeechSource::Local).await;
            }
            LocalInput::Hangup => return Some(CloseReason::Hangup),
        }
        None
    }

    /// Barge-in: cancel first, then flush playback, then replay held audio.
    async fn on_speech_started(&mut self, source: SpeechSource) -> Option<CloseReason> {
        let TurnAction::CancelResponse { replay } = self.turn.on_speech_started(source) else {
            return None;
        };

        info!(%source, replay_frames = replay.len(), "Barge-in, cancelling agent response");
        if let Err(e) = self.upstream.cancel_response().await {
            return Some(CloseReason::Transport(e.to_string()));
        }

        self.discard_output = true;
        self.cancelled_response = self.current_response.take();
        self.pipeline.downlink.clear();
        if self.local.send(LocalOutput::ClearPlayback).await.is_err() {
            return Some(CloseReason::LocalClosed);
        }

        for frame in &replay {
            if let Some(reason) = self.forward_upstream(frame).await {
                return Some(reason);
            }
        }
        None
    }

    async fn forward_upstream(&mut self, frame: &AudioFrame) -> Option<CloseReason> {
        let pcm = self.pipeline.uplink.to_upstream(frame);
        if pcm.is_empty() {
            return None;
        }
        match self.upstream.send_audio(pcm).await {
            Ok(()) => None,
            Err(e) => Some(CloseReason::Transport(e.to_string())),
        }
    }

    async fn on_tool_outcome(&mut self, outcome: ToolOutcome) -> Option<CloseReason> {
        if let Err(e) = self.tools.complete(&outcome) {
            warn!(error = %e, "Dropping tool result without an open invocation");
            return None;
        }

        // Output first, then continuation; the upstream turn logic needs
        // them in this order.
        let output = ControlEvent::FunctionCallOutput {
            call_id: outcome.call_id.clone(),
            output: outcome.output_json(),
        };
        if let Err(e) = self.upstream.send_control(output).await {
            return Some(CloseReason::Transport(e.to_string()));
        }
        if let Err(e) = self.upstream.send_control(ControlEvent::ResponseCreate).await {
            return Some(CloseReason::Transport(e.to_string()));
        }
        None
    }

    async fn on_protocol_error(&mut self, error: ProtocolError) -> Option<CloseReason> {
        warn!(error = %error, "Protocol error");
        let entry = match &error {
            ProtocolError::Upstream { .. } => UPSTREAM_ERROR_ENTRY.to_string(),
            other => other.to_string(),
        };
        self.transcript.push_system(entry);
        self.emit_transcript().await;

        if error.is_fatal() {
            let notice =
                LocalOutput::Notice("The agent ran into a problem and has to end the call.".to_string());
            let _ = self.local.send(notice).await;
            return Some(CloseReason::Fatal(error.to_string()));
        }
        None
    }

    // =========================================================================
    // Transcript
    // =========================================================================

    async fn ingest(&mut self, speaker: Speaker, text: String, is_final: bool) {
        let fragment = if is_final {
            TranscriptFragment::final_text(speaker, text)
        } else {
            TranscriptFragment::delta(speaker, text)
        };
        self.transcript.ingest(fragment, Instant::now());
        self.emit_transcript().await;
    }

    /// Send newly finalized entries to the sink and the caller side.
    async fn emit_transcript(&mut self) {
        let entries = self.transcript.drain();
        if entries.is_empty() {
            return;
        }
        self.entries_emitted += entries.len();

        if self.agent.enable_transcript
            && let Some(tx) = &self.sink_tx
        {
            // Never wait on the sink from the event loop
            match tx.try_send(SinkMessage::Append(entries.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.sink_dropped += entries.len();
                    warn!(
                        dropped = self.sink_dropped,
                        "Transcript sink is behind, dropping entries"
                    );
                }
                Err(TrySendError::Closed(_)) => warn!("Transcript sink forwarder is gone"),
            }
        }
        let _ = self.local.send(LocalOutput::Transcript(entries)).await;
    }

    fn start_sink_forwarder(&mut self) {
        let (tx, mut rx) = mpsc::channel::<SinkMessage>(SINK_QUEUE_CAPACITY);
        let sink = self.sink.clone();
        let session_id = self.id.clone();
        let agent_id = self.agent.agent_id.clone();

        let task = tokio::spawn(
            async move {
                while let Some(message) = rx.recv().await {
                    let result = match &message {
                        SinkMessage::Append(entries) => {
                            sink.append(&session_id, &agent_id, entries).await
                        }
                        SinkMessage::Ended(summary) => sink.session_ended(summary).await,
                    };
                    if let Err(e) = result {
                        warn!(error = %e, "Transcript sink delivery failed");
                    }
                }
            }
            .in_current_span(),
        );

        self.sink_tx = Some(tx);
        self.sink_task = Some(task);
    }

    // =========================================================================
    // Closing
    // =========================================================================

    async fn close(mut self, reason: CloseReason) -> CallSummary {
        self.set_state(SessionState::Closing);
        info!(%reason, "Closing session");

        self.drain_tools().await;

        self.transcript.flush();
        self.emit_transcript().await;

        let closing = LocalOutput::Closing {
            reason: reason.code().to_string(),
        };
        let _ = self.local.send(closing).await;
        self.local.close().await;

        if let Err(e) = self.upstream.disconnect().await {
            warn!(error = %e, "Upstream disconnect failed");
        }

        let summary = self.summary(SessionState::Closed, &reason);
        self.finish_sink(summary.clone()).await;

        self.set_state(SessionState::Closed);
        info!(
            duration_ms = summary.duration_ms,
            entries = summary.transcript_entries,
            "Session closed"
        );
        summary
    }

    /// Give pending tool calls the grace period, then abandon the rest.
    async fn drain_tools(&mut self) {
        if !self.tools.has_pending() {
            return;
        }

        let grace = self.options.tool_grace_period;
        let deadline = Instant::now() + grace;
        info!(
            pending = self.tools.pending(),
            grace_ms = grace.as_millis() as u64,
            "Waiting for pending tool calls"
        );

        while self.tools.has_pending() {
            tokio::select! {
                outcome = self.tools.next_outcome() => {
                    let Some(outcome) = outcome else { break };
                    if self.tools.complete(&outcome).is_err() {
                        continue;
                    }
                    if !self.upstream.is_ready() {
                        debug!(call_id = %outcome.call_id, "Upstream gone, discarding tool result");
                        continue;
                    }
                    // No continuation request: nobody is listening anymore.
                    let output = ControlEvent::FunctionCallOutput {
                        call_id: outcome.call_id.clone(),
                        output: outcome.output_json(),
                    };
                    if let Err(e) = self.upstream.send_control(output).await {
                        debug!(error = %e, "Could not deliver tool result during close");
                    }
                }
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        let abandoned = self.tools.abandon_all();
        if !abandoned.is_empty() {
            warn!(?abandoned, "Abandoned pending tool calls");
        }
    }

    async fn finish_sink(&mut self, summary: CallSummary) {
        let deadline = Instant::now() + SINK_DRAIN_TIMEOUT;
        if let Some(tx) = self.sink_tx.take() {
            match tokio::time::timeout_at(deadline, tx.send(SinkMessage::Ended(summary))).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Transcript sink forwarder is gone"),
                Err(_) => warn!("Transcript sink queue stayed full, call summary dropped"),
            }
        }

        if let Some(mut task) = self.sink_task.take()
            && tokio::time::timeout_at(deadline, &mut task).await.is_err()
        {
            warn!("Transcript sink did not drain in time");
            task.abort();
        }
    }

    fn summary(&self, final_state: SessionState, reason: &CloseReason) -> CallSummary {
        CallSummary {
            session_id: self.id.clone(),
            agent_id: self.agent.agent_id.clone(),
            started_at: self.started_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
            final_state,
            close_reason: reason.to_string(),
            transcript_entries: self.entries_emitted,
            barge_ins: self.turn.barge_ins(),
            tool_calls: self.tool_calls,
        }
    }

    fn set_state(&self, next: SessionState) {
        if let Err(e) = self.machine.transition(next) {
            error!(error = %e, "Rejected session state change");
        }
    }
}

async fn open_upstream(
    upstream: &mut BoxedRealtime,
    settings: SessionSettings,
    upstream_session_id: &mut Option<String>,
) -> SessionResult<mpsc::Receiver<ModelEvent>> {
    let mut events = upstream.connect().await?;
    upstream
        .send_control(ControlEvent::SessionUpdate(Box::new(settings)))
        .await?;

    loop {
        match events.recv().await {
            Some(ModelEvent::SessionReady) => return Ok(events),
            Some(ModelEvent::SessionCreated { session_id }) => {
                debug!(upstream_session_id = %session_id, "Upstream session created");
                *upstream_session_id = Some(session_id);
            }
            Some(ModelEvent::Error {
                code,
                message,
                fatal: true,
            }) => {
                return Err(SessionError::Protocol(ProtocolError::Upstream {
                    code,
                    message,
                    fatal: true,
                }));
            }
            Some(ModelEvent::Error { code, message, .. }) => {
                warn!(?code, %message, "Upstream error during setup");
            }
            Some(other) => {
                debug!(event = other.name(), "Ignoring event before session is ready");
            }
            None => {
                return Err(SessionError::Transport(
                    "upstream closed during setup".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_codes_hide_details() {
        let reason = CloseReason::Fatal("server_error: stack trace".to_string());
        assert_eq!(reason.code(), "agent_error");
        assert!(reason.to_string().contains("server_error"));
        assert_eq!(CloseReason::Hangup.code(), "hangup");
        assert_eq!(CloseReason::Hangup.to_string(), "caller hung up");
    }
}
