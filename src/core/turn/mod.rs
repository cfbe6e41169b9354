//! Turn-taking and barge-in.
//!
//! Tracks whether the agent is speaking and decides when caller speech must
//! cancel the agent's in-flight response. Caller audio that arrives while the
//! agent speaks is held back (or forwarded, per policy) until a speech-started
//! signal authorizes the interruption.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::audio::AudioFrame;

/// Turn detection mode configured per agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDetectionMode {
    /// Silence-based detection upstream
    #[default]
    Normal,
    /// Semantic end-of-turn detection upstream
    Semantic,
    /// No turn detection; the controller passes everything through
    Disabled,
}

/// What happens to caller audio while the agent is speaking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerAudioPolicy {
    /// Hold frames back until barge-in is confirmed
    #[default]
    Hold,
    /// Keep forwarding; upstream voice activity detection decides
    Forward,
}

/// Where a speech-started signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSource {
    Upstream,
    Local,
}

impl std::fmt::Display for SpeechSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechSource::Upstream => write!(f, "upstream"),
            SpeechSource::Local => write!(f, "local"),
        }
    }
}

/// Controller settings for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSettings {
    pub mode: TurnDetectionMode,
    pub caller_audio_policy: CallerAudioPolicy,
    /// Most recent held caller audio replayed upstream after a barge-in
    pub barge_in_replay_ms: u32,
    /// Local frame duration, used to size the replay ring
    pub frame_ms: u32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            mode: TurnDetectionMode::Normal,
            caller_audio_policy: CallerAudioPolicy::Hold,
            barge_in_replay_ms: 300,
            frame_ms: 20,
        }
    }
}

/// Decision returned for a speech-started signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    /// Nothing to do
    None,
    /// Cancel the in-flight response, then forward `replay` before any new
    /// caller audio
    CancelResponse { replay: Vec<AudioFrame> },
}

/// Barge-in state machine.
#[derive(Debug)]
pub struct TurnController {
    settings: TurnSettings,
    agent_speaking: bool,
    held: VecDeque<AudioFrame>,
    replay_capacity: usize,
    barge_ins: u64,
}

impl TurnController {
    pub fn new(settings: TurnSettings) -> Self {
        let replay_capacity = if settings.frame_ms == 0 {
            0
        } else {
            settings.barge_in_replay_ms.div_ceil(settings.frame_ms) as usize
        };
        Self {
            settings,
            agent_speaking: false,
            held: VecDeque::with_capacity(replay_capacity),
            replay_capacity,
            barge_ins: 0,
        }
    }

    #[inline]
    pub fn is_agent_speaking(&self) -> bool {
        self.agent_speaking
    }

    #[inline]
    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Number of barge-ins that produced a cancellation.
    pub fn barge_ins(&self) -> u64 {
        self.barge_ins
    }

    /// Agent audio or transcript output observed.
    pub fn on_agent_output(&mut self) {
        if self.settings.mode == TurnDetectionMode::Disabled {
            return;
        }
        if !self.agent_speaking {
            trace!("Agent started speaking");
        }
        self.agent_speaking = true;
    }

    /// Response finished or its cancellation was acknowledged.
    ///
    /// Audio held during the utterance without a confirmed barge-in is
    /// treated as echo and discarded.
    pub fn on_response_done(&mut self) {
        if self.agent_speaking {
            trace!(held = self.held.len(), "Agent stopped speaking");
        }
        self.agent_speaking = false;
        self.held.clear();
    }

    /// Caller speech started. Yields exactly one cancellation per utterance
    /// that interrupts the agent.
    pub fn on_speech_started(&mut self, source: SpeechSource) -> TurnAction {
        if self.settings.mode == TurnDetectionMode::Disabled || !self.agent_speaking {
            return TurnAction::None;
        }
        self.agent_speaking = false;
        self.barge_ins += 1;
        let replay: Vec<AudioFrame> = self.held.drain(..).collect();
        debug!(%source, replay_frames = replay.len(), "Barge-in confirmed");
        TurnAction::CancelResponse { replay }
    }

    /// Route one caller frame: `Some` to forward now, `None` if held.
    pub fn on_caller_frame(&mut self, frame: AudioFrame) -> Option<AudioFrame> {
        if self.settings.mode == TurnDetectionMode::Disabled
            || self.settings.caller_audio_policy == CallerAudioPolicy::Forward
            || !self.agent_speaking
        {
            return Some(frame);
        }
        if self.replay_capacity > 0 {
            if self.held.len() == self.replay_capacity {
                self.held.pop_front();
            }
            self.held.push_back(frame);
        }
        None
    }

    /// Frames currently held for replay.
    pub fn held_frames(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![seq as i16; 4], seq)
    }

    fn controller(policy: CallerAudioPolicy, replay_ms: u32) -> TurnController {
        TurnController::new(TurnSettings {
            mode: TurnDetectionMode::Normal,
            caller_audio_policy: policy,
            barge_in_replay_ms: replay_ms,
            frame_ms: 20,
        })
    }

    #[test]
    fn test_forwards_while_agent_silent() {
        let mut turn = controller(CallerAudioPolicy::Hold, 300);
        assert_eq!(turn.on_caller_frame(frame(0)), Some(frame(0)));
    }

    #[test]
    fn test_holds_while_agent_speaking() {
        let mut turn = controller(CallerAudioPolicy::Hold, 300);
        turn.on_agent_output();
        assert!(turn.on_caller_frame(frame(0)).is_none());
        assert_eq!(turn.held_frames(), 1);
    }

    #[test]
    fn test_barge_in_cancels_once_and_replays() {
        let mut turn = controller(CallerAudioPolicy::Hold, 300);
        turn.on_agent_output();
        turn.on_caller_frame(frame(1));
        turn.on_caller_frame(frame(2));

        let action = turn.on_speech_started(SpeechSource::Upstream);
        assert_eq!(
            action,
            TurnAction::CancelResponse {
                replay: vec![frame(1), frame(2)]
            }
        );
        assert!(!turn.is_agent_speaking());

        // Same utterance reported by the other source
        assert_eq!(turn.on_speech_started(SpeechSource::Local), TurnAction::None);
        assert_eq!(turn.on_caller_frame(frame(3)), Some(frame(3)));
        assert_eq!(turn.barge_ins(), 1);
    }

    #[test]
    fn test_replay_ring_is_bounded() {
        let mut turn = controller(CallerAudioPolicy::Hold, 60);
        turn.on_agent_output();
        for seq in 0..10 {
            turn.on_caller_frame(frame(seq));
        }
        assert_eq!(turn.held_frames(), 3);
        match turn.on_speech_started(SpeechSource::Local) {
            TurnAction::CancelResponse { replay } => {
                let seqs: Vec<u64> = replay.iter().map(|f| f.sequence()).collect();
                assert_eq!(seqs, vec![7, 8, 9]);
            }
            TurnAction::None => panic!("expected cancellation"),
        }
    }

    #[test]
    fn test_zero_replay_discards_held_audio() {
        let mut turn = controller(CallerAudioPolicy::Hold, 0);
        turn.on_agent_output();
        assert!(turn.on_caller_frame(frame(0)).is_none());
        assert_eq!(
            turn.on_speech_started(SpeechSource::Upstream),
            TurnAction::CancelResponse { replay: vec![] }
        );
    }

    #[test]
    fn test_speech_without_agent_output_is_noop() {
        let mut turn = controller(CallerAudioPolicy::Hold, 300);
        assert_eq!(turn.on_speech_started(SpeechSource::Upstream), TurnAction::None);
    }

    #[test]
    fn test_response_done_clears_speaking_and_held() {
        let mut turn = controller(CallerAudioPolicy::Hold, 300);
        turn.on_agent_output();
        turn.on_caller_frame(frame(0));
        turn.on_response_done();
        assert!(!turn.is_agent_speaking());
        assert_eq!(turn.held_frames(), 0);
        assert_eq!(turn.on_speech_started(SpeechSource::Upstream), TurnAction::None);
    }

    #[test]
    fn test_forward_policy_never_holds() {
        let mut turn = controller(CallerAudioPolicy::Forward, 300);
        turn.on_agent_output();
        assert_eq!(turn.on_caller_frame(frame(0)), Some(frame(0)));
        assert!(matches!(
            turn.on_speech_started(SpeechSource::Upstream),
            TurnAction::CancelResponse { replay } if replay.is_empty()
        ));
    }

    #[test]
    fn test_disabled_mode_is_passthrough() {
        let mut turn = TurnController::new(TurnSettings {
            mode: TurnDetectionMode::Disabled,
            ..TurnSettings::default()
        });
        turn.on_agent_output();
        assert!(!turn.is_agent_speaking());
        assert_eq!(turn.on_caller_frame(frame(0)), Some(frame(0)));
        assert_eq!(turn.on_speech_started(SpeechSource::Upstream), TurnAction::None);
    }

    #[test]
    fn test_interleavings_cancel_exactly_once_per_utterance() {
        // speech-started while speaking => exactly one cancel before the next forwarded frame
        let script = [
            "out", "frame", "speech", "frame", "out", "out", "speech", "speech", "frame", "speech",
            "out", "frame", "speech", "frame",
        ];
        let mut turn = controller(CallerAudioPolicy::Hold, 40);
        let mut cancels_since_output = 0;
        let mut seq = 0;
        for step in script {
            match step {
                "out" => {
                    turn.on_agent_output();
                    cancels_since_output = 0;
                }
                "speech" => {
                    let was_speaking = turn.is_agent_speaking();
                    let action = turn.on_speech_started(SpeechSource::Upstream);
                    if was_speaking {
                        assert!(matches!(action, TurnAction::CancelResponse { .. }));
                        cancels_since_output += 1;
                    } else {
                        assert_eq!(action, TurnAction::None);
                    }
                    assert!(cancels_since_output <= 1);
                }
                _ => {
                    let forwarded = turn.on_caller_frame(frame(seq)).is_some();
                    assert_eq!(forwarded, !turn.is_agent_speaking());
                    seq += 1;
                }
            }
        }
    }
}
