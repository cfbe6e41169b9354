//! Session scenarios against an in-process upstream
//!
//! Each test drives one [`VoiceSession`] through a [`ChannelLocalAudio`] peer
//! and a scripted upstream, then checks what reached each side.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use common::{
    FakeRealtime, ScriptedExecutor, Sent, UpstreamScript, agent_audio, eventually, next_matching,
    silence_frame,
};
use voice_agent_bridge::core::realtime::openai::MALFORMED_ERROR_MESSAGE;
use voice_agent_bridge::core::realtime::{
    ControlEvent, ModelEvent, ResponseStatus, ToolDefinition,
};
use voice_agent_bridge::core::session::{
    AgentConfig, CallSummary, ChannelLocalAudio, LocalInput, LocalOutput, LocalPeer, MemorySink,
    SessionDeps, SessionHandle, SessionOptions, SessionState, SharedTranscriptSink, SinkError,
    TranscriptSink, VoiceSession,
};
use voice_agent_bridge::core::tools::SharedToolExecutor;
use voice_agent_bridge::core::transcript::{Speaker, TranscriptEntry};
use voice_agent_bridge::core::turn::CallerAudioPolicy;

struct Call {
    peer: LocalPeer,
    upstream: UpstreamScript,
    sink: Arc<MemorySink>,
    handle: SessionHandle,
    task: JoinHandle<CallSummary>,
}

impl Call {
    fn start(
        agent: AgentConfig,
        options: SessionOptions,
        executor: SharedToolExecutor,
        upstream: (FakeRealtime, UpstreamScript),
    ) -> Self {
        let (fake, script) = upstream;
        let (channel, peer) = ChannelLocalAudio::pair(64);
        let sink = MemorySink::new();
        let shared_sink: SharedTranscriptSink = sink.clone();

        let session = VoiceSession::new(
            "call-1",
            agent,
            options,
            Box::new(channel),
            SessionDeps {
                upstream: Box::new(fake),
                executor,
                sink: shared_sink,
            },
        )
        .unwrap();
        let handle = session.handle();
        let task = tokio::spawn(session.run());

        Self {
            peer,
            upstream: script,
            sink,
            handle,
            task,
        }
    }

    /// Start a call and wait until the caller has been told it is ready.
    async fn ready(agent: AgentConfig, executor: SharedToolExecutor) -> Self {
        let mut call = Self::start(
            agent,
            SessionOptions::default(),
            executor,
            FakeRealtime::pair(),
        );
        call.upstream.accept().await;
        let ready = call.next(|out| matches!(out, LocalOutput::Ready { .. })).await;
        assert_eq!(
            ready,
            LocalOutput::Ready {
                session_id: "call-1".to_string()
            }
        );
        call
    }

    async fn next(&mut self, pred: impl Fn(&LocalOutput) -> bool) -> LocalOutput {
        next_matching(&mut self.peer.output, pred).await
    }

    async fn send(&self, input: LocalInput) {
        self.peer.input.send(input).await.unwrap();
    }

    /// Hang up and collect the outputs that arrive before `closing`.
    async fn hang_up(mut self) -> (Vec<LocalOutput>, CallSummary, UpstreamScript, Arc<MemorySink>) {
        self.send(LocalInput::Hangup).await;
        let mut outputs = Vec::new();
        loop {
            let out = self.next(|_| true).await;
            if let LocalOutput::Closing { reason } = &out {
                assert_eq!(reason, "hangup");
                break;
            }
            outputs.push(out);
        }
        let summary = self.task.await.unwrap();
        (outputs, summary, self.upstream, self.sink)
    }
}

fn no_tools() -> SharedToolExecutor {
    Arc::new(ScriptedExecutor::new())
}

fn agent_with_tools() -> AgentConfig {
    let mut agent = AgentConfig::new("support");
    agent.tools = vec![ToolDefinition::function(
        "lookup_contact",
        Some("Find a contact by phone number".to_string()),
        Some(json!({
            "type": "object",
            "properties": { "phone": { "type": "string" } },
            "required": ["phone"]
        })),
    )];
    agent
}

fn function_output(controls: &[ControlEvent], call_id: &str) -> Value {
    let output = controls
        .iter()
        .find_map(|c| match c {
            ControlEvent::FunctionCallOutput { call_id: id, output } if id == call_id => {
                Some(output.clone())
            }
            _ => None,
        })
        .expect("no function call output");
    serde_json::from_str(&output).unwrap()
}

fn position(sent: &[Sent], pred: impl Fn(&Sent) -> bool) -> Option<usize> {
    sent.iter().position(pred)
}

// =============================================================================
// Setup and teardown
// =============================================================================

#[tokio::test]
async fn test_session_update_is_sent_first() {
    let mut agent = AgentConfig::new("support");
    agent.system_prompt = Some("Be brief.".to_string());
    let call = Call::ready(agent, no_tools()).await;

    let controls = call.upstream.controls();
    let ControlEvent::SessionUpdate(settings) = &controls[0] else {
        panic!("expected session update first, got {:?}", controls[0]);
    };
    assert_eq!(settings.instructions.as_deref(), Some("Be brief."));
    assert_eq!(call.handle.state(), SessionState::Active);

    let (_, summary, upstream, _) = call.hang_up().await;
    assert_eq!(summary.final_state, SessionState::Closed);
    assert_eq!(upstream.disconnects(), 1);
}

#[tokio::test]
async fn test_hangup_flushes_transcript_and_summary() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;

    call.upstream
        .push(ModelEvent::OutputTranscript {
            text: "It is ".to_string(),
            is_final: false,
        })
        .await;
    call.upstream
        .push(ModelEvent::OutputTranscript {
            text: "noon.".to_string(),
            is_final: false,
        })
        .await;
    call.upstream
        .push(ModelEvent::InputTranscript {
            text: "Thanks".to_string(),
            is_final: true,
        })
        .await;
    call.next(|out| match out {
        LocalOutput::Transcript(entries) => entries.iter().any(|e| e.speaker == Speaker::Caller),
        _ => false,
    })
    .await;

    let (_, summary, _, sink) = call.hang_up().await;

    let entries = sink.entries();
    assert!(
        entries
            .iter()
            .any(|e| e.speaker == Speaker::Caller && e.text == "Thanks")
    );
    assert!(
        entries
            .iter()
            .any(|e| e.speaker == Speaker::Agent && e.text == "It is noon.")
    );

    let summaries = sink.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0], summary);
    assert_eq!(summary.close_reason, "caller hung up");
    assert_eq!(summary.transcript_entries, entries.len());
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_fails_without_sink() {
    let options = SessionOptions {
        connect_timeout: Duration::from_millis(200),
        ..SessionOptions::default()
    };
    let mut call = Call::start(
        AgentConfig::new("support"),
        options,
        no_tools(),
        FakeRealtime::stalled(),
    );

    let closing = call.next(|_| true).await;
    assert_eq!(
        closing,
        LocalOutput::Closing {
            reason: "unavailable".to_string()
        }
    );

    let summary = call.task.await.unwrap();
    assert_eq!(summary.final_state, SessionState::Failed);
    assert!(call.sink.summaries().is_empty());
    assert!(call.upstream.controls().is_empty());
}

#[tokio::test]
async fn test_fatal_error_before_ready_fails() {
    let mut call = Call::start(
        AgentConfig::new("support"),
        SessionOptions::default(),
        no_tools(),
        FakeRealtime::pair(),
    );
    call.upstream
        .push(ModelEvent::Error {
            code: Some("invalid_api_key".to_string()),
            message: "bad key".to_string(),
            fatal: true,
        })
        .await;

    let closing = call.next(|_| true).await;
    assert!(matches!(closing, LocalOutput::Closing { reason } if reason == "unavailable"));
    let summary = call.task.await.unwrap();
    assert_eq!(summary.final_state, SessionState::Failed);
    assert_eq!(call.upstream.disconnects(), 1);
}

#[tokio::test]
async fn test_fatal_error_ends_call_with_generic_notice() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    call.upstream
        .push(ModelEvent::Error {
            code: Some("server_error".to_string()),
            message: "internal stack trace".to_string(),
            fatal: true,
        })
        .await;

    let notice = call.next(|out| matches!(out, LocalOutput::Notice(_))).await;
    let LocalOutput::Notice(message) = notice else {
        unreachable!()
    };
    assert!(!message.contains("stack trace"));

    let closing = call.next(|out| matches!(out, LocalOutput::Closing { .. })).await;
    assert_eq!(
        closing,
        LocalOutput::Closing {
            reason: "agent_error".to_string()
        }
    );

    let summary = call.task.await.unwrap();
    assert_eq!(summary.final_state, SessionState::Closed);
    let system: Vec<_> = call
        .sink
        .entries()
        .into_iter()
        .filter(|e| e.speaker == Speaker::System)
        .collect();
    assert_eq!(system.len(), 1);
    assert!(!system[0].text.contains("server_error"));
    assert!(!system[0].text.contains("stack trace"));
}

#[tokio::test]
async fn test_non_fatal_error_keeps_call_alive() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    call.upstream
        .push(ModelEvent::Error {
            code: Some("rate_limit_exceeded".to_string()),
            message: "slow down".to_string(),
            fatal: false,
        })
        .await;
    call.next(|out| match out {
        LocalOutput::Transcript(entries) => entries.iter().any(|e| e.speaker == Speaker::System),
        _ => false,
    })
    .await;

    let (outputs, summary, _, sink) = call.hang_up().await;
    assert!(!outputs.iter().any(|o| matches!(o, LocalOutput::Notice(_))));
    assert_eq!(summary.close_reason, "caller hung up");
    let system: Vec<_> = sink
        .entries()
        .into_iter()
        .filter(|e| e.speaker == Speaker::System)
        .collect();
    assert_eq!(system.len(), 1);
    assert!(!system[0].text.contains("rate_limit_exceeded"));
}

#[tokio::test]
async fn test_unreadable_upstream_error_is_surfaced() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    // What the decoder yields for an error event it cannot read
    call.upstream
        .push(ModelEvent::Error {
            code: None,
            message: MALFORMED_ERROR_MESSAGE.to_string(),
            fatal: false,
        })
        .await;
    call.next(|out| match out {
        LocalOutput::Transcript(entries) => entries.iter().any(|e| e.speaker == Speaker::System),
        _ => false,
    })
    .await;

    let (outputs, summary, _, _) = call.hang_up().await;
    assert!(!outputs.iter().any(|o| matches!(o, LocalOutput::Notice(_))));
    assert_eq!(summary.close_reason, "caller hung up");
}

#[tokio::test]
async fn test_cancel_from_handle_closes_with_shutdown() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    call.handle.cancel();
    call.handle.cancel();

    let closing = call.next(|out| matches!(out, LocalOutput::Closing { .. })).await;
    assert_eq!(
        closing,
        LocalOutput::Closing {
            reason: "shutdown".to_string()
        }
    );
    call.handle.closed().await;
    assert_eq!(call.handle.state(), SessionState::Closed);
    let summary = call.task.await.unwrap();
    assert_eq!(summary.close_reason, "shutdown");
    assert_eq!(call.upstream.disconnects(), 1);
    assert_eq!(call.sink.summaries().len(), 1);
}

#[tokio::test]
async fn test_caller_disconnect_closes_upstream() {
    let call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    let Call {
        peer,
        upstream,
        sink,
        task,
        ..
    } = call;
    drop(peer);

    let summary = task.await.unwrap();
    assert_eq!(summary.close_reason, "local channel closed");
    assert_eq!(upstream.disconnects(), 1);
    assert!(!upstream.is_ready());
    assert_eq!(sink.summaries().len(), 1);
}

#[tokio::test]
async fn test_upstream_close_ends_call() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    call.upstream.hang_up();

    let closing = call.next(|out| matches!(out, LocalOutput::Closing { .. })).await;
    assert_eq!(
        closing,
        LocalOutput::Closing {
            reason: "upstream_closed".to_string()
        }
    );
    // The caller side is released once the session closes
    let released = tokio::time::timeout(Duration::from_secs(5), call.peer.output.recv())
        .await
        .expect("local output was not released");
    assert!(released.is_none());

    let summary = call.task.await.unwrap();
    assert_eq!(summary.final_state, SessionState::Closed);
    assert_eq!(summary.close_reason, "upstream closed");
    assert_eq!(call.upstream.disconnects(), 1);
    assert!(!call.upstream.is_ready());
    assert_eq!(call.sink.summaries().len(), 1);
}

/// Accepts transcript batches and never finishes delivering them.
#[derive(Default)]
struct HangingSink {
    appends: AtomicUsize,
}

#[async_trait]
impl TranscriptSink for HangingSink {
    async fn append(
        &self,
        _session_id: &str,
        _agent_id: &str,
        _entries: &[TranscriptEntry],
    ) -> Result<(), SinkError> {
        self.appends.fetch_add(1, Ordering::AcqRel);
        std::future::pending().await
    }

    async fn session_ended(&self, _summary: &CallSummary) -> Result<(), SinkError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_sink_does_not_block_audio() {
    let (fake, upstream) = FakeRealtime::pair();
    let (channel, mut peer) = ChannelLocalAudio::pair(64);
    let sink = Arc::new(HangingSink::default());
    let shared_sink: SharedTranscriptSink = sink.clone();

    let session = VoiceSession::new(
        "call-1",
        AgentConfig::new("support"),
        SessionOptions::default(),
        Box::new(channel),
        SessionDeps {
            upstream: Box::new(fake),
            executor: no_tools(),
            sink: shared_sink,
        },
    )
    .unwrap();
    let task = tokio::spawn(session.run());

    upstream.accept().await;
    next_matching(&mut peer.output, |out| matches!(out, LocalOutput::Ready { .. })).await;

    // More finalized entries than the sink queue holds
    for i in 0..80 {
        upstream
            .push(ModelEvent::InputTranscript {
                text: format!("utterance {i}"),
                is_final: true,
            })
            .await;
    }
    upstream.push(agent_audio(1, "resp_1", 7)).await;

    let audio = tokio::time::timeout(
        Duration::from_secs(3),
        next_matching(&mut peer.output, |out| matches!(out, LocalOutput::Audio(_))),
    )
    .await
    .expect("agent audio stalled behind the transcript sink");
    assert!(matches!(audio, LocalOutput::Audio(_)));
    // Only the first batch ever reached the sink
    let appends = sink.clone();
    eventually(|| appends.appends.load(Ordering::Acquire) == 1).await;

    peer.input.send(LocalInput::Hangup).await.unwrap();
    next_matching(&mut peer.output, |out| matches!(out, LocalOutput::Closing { .. })).await;
    let summary = task.await.unwrap();
    assert_eq!(summary.final_state, SessionState::Closed);
    assert_eq!(summary.transcript_entries, 80);
}

// =============================================================================
// Audio and barge-in
// =============================================================================

#[tokio::test]
async fn test_caller_audio_flows_upstream_when_agent_silent() {
    let call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    for _ in 0..3 {
        call.send(LocalInput::Audio(silence_frame())).await;
    }
    // Odd-length frame is dropped, the call continues
    call.send(LocalInput::Audio(bytes::Bytes::from_static(&[0u8; 3])))
        .await;

    let upstream = &call.upstream;
    eventually(|| upstream.sent().iter().filter(|s| s.is_audio()).count() == 3).await;

    let (_, summary, upstream, _) = call.hang_up().await;
    assert_eq!(
        upstream.sent().iter().filter(|s| s.is_audio()).count(),
        3
    );
    assert_eq!(summary.barge_ins, 0);
}

#[tokio::test]
async fn test_local_barge_in_cancels_before_replay() {
    let mut call = Call::ready(AgentConfig::new("support"), no_tools()).await;

    call.upstream.push(agent_audio(3, "resp_1", 1)).await;
    for _ in 0..3 {
        call.next(|out| matches!(out, LocalOutput::Audio(_))).await;
    }

    // Agent is speaking: caller frames are held back
    call.send(LocalInput::Audio(silence_frame())).await;
    call.send(LocalInput::Audio(silence_frame())).await;
    call.send(LocalInput::SpeechStarted).await;

    call.next(|out| matches!(out, LocalOutput::ClearPlayback))
        .await;

    let upstream = &call.upstream;
    eventually(|| upstream.sent().iter().filter(|s| s.is_audio()).count() == 2).await;

    let sent = call.upstream.sent();
    let cancel = position(&sent, |s| {
        matches!(s, Sent::Control(ControlEvent::ResponseCancel))
    })
    .expect("no cancel sent");
    let first_audio = position(&sent, Sent::is_audio).unwrap();
    assert!(cancel < first_audio, "held audio replayed before cancel");

    // Late audio from the cancelled response never reaches the caller
    call.upstream
        .push(ModelEvent::SpeechStarted {
            audio_start_ms: Some(1200),
        })
        .await;
    call.upstream.push(agent_audio(2, "resp_1", 1)).await;
    call.upstream
        .push(ModelEvent::ResponseComplete {
            response_id: Some("resp_1".to_string()),
            status: ResponseStatus::Cancelled,
        })
        .await;
    call.upstream.push(agent_audio(1, "resp_2", 2)).await;
    call.upstream
        .push(ModelEvent::ResponseComplete {
            response_id: Some("resp_2".to_string()),
            status: ResponseStatus::Completed,
        })
        .await;

    let LocalOutput::Audio(frame) = call.next(|out| matches!(out, LocalOutput::Audio(_))).await
    else {
        unreachable!()
    };
    assert!(frame.iter().all(|b| *b == 2), "stale audio reached the caller");

    let (outputs, summary, upstream, _) = call.hang_up().await;
    assert!(!outputs.iter().any(|o| matches!(o, LocalOutput::Audio(_))));
    assert_eq!(upstream.count("response_cancel"), 1);
    assert_eq!(summary.barge_ins, 1);
}

#[tokio::test]
async fn test_upstream_barge_in_with_forwarded_audio() {
    let mut agent = AgentConfig::new("support");
    agent.turn_detection.caller_audio_policy = CallerAudioPolicy::Forward;
    let mut call = Call::ready(agent, no_tools()).await;

    call.upstream.push(agent_audio(2, "resp_1", 1)).await;
    for _ in 0..2 {
        call.next(|out| matches!(out, LocalOutput::Audio(_))).await;
    }

    call.send(LocalInput::Audio(silence_frame())).await;
    let upstream = &call.upstream;
    eventually(|| upstream.sent().iter().any(Sent::is_audio)).await;

    call.upstream
        .push(ModelEvent::SpeechStarted {
            audio_start_ms: None,
        })
        .await;
    call.next(|out| matches!(out, LocalOutput::ClearPlayback))
        .await;

    let (_, summary, upstream, _) = call.hang_up().await;
    assert_eq!(upstream.count("response_cancel"), 1);
    assert_eq!(summary.barge_ins, 1);
}

#[tokio::test]
async fn test_speech_while_agent_silent_is_not_a_barge_in() {
    let call = Call::ready(AgentConfig::new("support"), no_tools()).await;
    call.send(LocalInput::SpeechStarted).await;
    call.upstream
        .push(ModelEvent::SpeechStarted {
            audio_start_ms: None,
        })
        .await;

    let (outputs, summary, upstream, _) = call.hang_up().await;
    assert!(!outputs.contains(&LocalOutput::ClearPlayback));
    assert_eq!(upstream.count("response_cancel"), 0);
    assert_eq!(summary.barge_ins, 0);
}

// =============================================================================
// Tools
// =============================================================================

#[tokio::test]
async fn test_tool_round_trip() {
    let executor = Arc::new(
        ScriptedExecutor::new().with_result("lookup_contact", json!({ "name": "Ada Lovelace" })),
    );
    let call = Call::ready(agent_with_tools(), executor.clone()).await;

    call.upstream
        .push(ModelEvent::FunctionCallRequest {
            call_id: "call_abc".to_string(),
            tool_name: "lookup_contact".to_string(),
            arguments: r#"{"phone":"+15550100"}"#.to_string(),
        })
        .await;

    let upstream = &call.upstream;
    eventually(|| upstream.count("response_create") == 1).await;

    let controls = call.upstream.controls();
    let output_at = controls
        .iter()
        .position(|c| matches!(c, ControlEvent::FunctionCallOutput { .. }))
        .unwrap();
    let create_at = controls
        .iter()
        .position(|c| *c == ControlEvent::ResponseCreate)
        .unwrap();
    assert!(output_at < create_at);

    let output = function_output(&controls, "call_abc");
    assert_eq!(output["success"], true);
    assert_eq!(output["result"]["name"], "Ada Lovelace");

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].agent_id, "support");
    assert_eq!(calls[0].arguments, json!({ "phone": "+15550100" }));

    let (_, summary, _, _) = call.hang_up().await;
    assert_eq!(summary.tool_calls, 1);
}

#[tokio::test]
async fn test_malformed_arguments_answered_without_executor() {
    let executor = Arc::new(ScriptedExecutor::new().with_result("lookup_contact", json!({})));
    let call = Call::ready(agent_with_tools(), executor.clone()).await;

    call.upstream
        .push(ModelEvent::FunctionCallRequest {
            call_id: "call_bad".to_string(),
            tool_name: "lookup_contact".to_string(),
            arguments: r#"{"phone": "+1555"#.to_string(),
        })
        .await;

    let upstream = &call.upstream;
    eventually(|| upstream.count("response_create") == 1).await;

    let output = function_output(&call.upstream.controls(), "call_bad");
    assert_eq!(output["success"], false);
    assert!(output["error"].as_str().unwrap().contains("invalid arguments"));
    assert!(executor.calls().is_empty());

    call.hang_up().await;
}

#[tokio::test]
async fn test_duplicate_call_id_answered_once() {
    let executor = Arc::new(
        ScriptedExecutor::new().with_result("lookup_contact", json!({ "name": "Ada Lovelace" })),
    );
    let call = Call::ready(agent_with_tools(), executor.clone()).await;

    for _ in 0..2 {
        call.upstream
            .push(ModelEvent::FunctionCallRequest {
                call_id: "call_dup".to_string(),
                tool_name: "lookup_contact".to_string(),
                arguments: r#"{"phone":"+15550100"}"#.to_string(),
            })
            .await;
    }

    let upstream = &call.upstream;
    eventually(|| upstream.count("response_create") == 1).await;

    let (_, summary, upstream, sink) = call.hang_up().await;
    assert_eq!(upstream.count("function_call_output"), 1);
    assert_eq!(upstream.count("response_create"), 1);
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(summary.tool_calls, 2);
    // The rejected request is recorded, not answered
    assert!(sink.entries().iter().any(|e| e.speaker == Speaker::System));
}

#[tokio::test]
async fn test_tool_not_enabled_for_agent() {
    let executor = Arc::new(ScriptedExecutor::new().with_result("delete_account", json!({})));
    let call = Call::ready(agent_with_tools(), executor.clone()).await;

    call.upstream
        .push(ModelEvent::FunctionCallRequest {
            call_id: "call_x".to_string(),
            tool_name: "delete_account".to_string(),
            arguments: "{}".to_string(),
        })
        .await;

    let upstream = &call.upstream;
    eventually(|| upstream.count("function_call_output") == 1).await;

    let output = function_output(&call.upstream.controls(), "call_x");
    assert_eq!(output["success"], false);
    assert!(output["error"].as_str().unwrap().contains("not enabled"));
    assert!(executor.calls().is_empty());

    call.hang_up().await;
}

#[tokio::test(start_paused = true)]
async fn test_pending_tool_finishes_within_grace_period() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .with_result("lookup_contact", json!({ "name": "Ada" }))
            .with_delay(Duration::from_millis(500)),
    );
    let mut call = Call::ready(agent_with_tools(), executor).await;

    call.upstream
        .push(ModelEvent::FunctionCallRequest {
            call_id: "call_slow".to_string(),
            tool_name: "lookup_contact".to_string(),
            arguments: r#"{"phone":"1"}"#.to_string(),
        })
        .await;
    call.send(LocalInput::Hangup).await;

    let closing = call.next(|out| matches!(out, LocalOutput::Closing { .. })).await;
    assert_eq!(
        closing,
        LocalOutput::Closing {
            reason: "hangup".to_string()
        }
    );
    call.task.await.unwrap();

    // Delivered during close, with no continuation request
    let output = function_output(&call.upstream.controls(), "call_slow");
    assert_eq!(output["success"], true);
    assert_eq!(call.upstream.count("response_create"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_tool_abandoned_after_grace_period() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .with_result("lookup_contact", json!({ "name": "Ada" }))
            .with_delay(Duration::from_secs(10)),
    );
    let mut call = Call::ready(agent_with_tools(), executor.clone()).await;

    call.upstream
        .push(ModelEvent::FunctionCallRequest {
            call_id: "call_stuck".to_string(),
            tool_name: "lookup_contact".to_string(),
            arguments: r#"{"phone":"1"}"#.to_string(),
        })
        .await;
    let calls = executor.clone();
    eventually(|| calls.calls().len() == 1).await;
    call.upstream.hang_up();

    let closing = call.next(|out| matches!(out, LocalOutput::Closing { .. })).await;
    assert_eq!(
        closing,
        LocalOutput::Closing {
            reason: "upstream_closed".to_string()
        }
    );
    let summary = call.task.await.unwrap();

    assert_eq!(call.upstream.count("function_call_output"), 0);
    assert!(summary.duration_ms >= 2000);
    assert!(summary.duration_ms < 10_000);
}
