//! Per-call configuration: the agent snapshot and session timing options.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{SessionError, SessionResult};
use crate::core::audio::{AudioFormat, DEFAULT_FRAME_DURATION_MS, DEFAULT_LOCAL_SAMPLE_RATE};
use crate::core::realtime::{
    RealtimeConfig, SessionSettings, ToolDefinition, TurnDetectionConfig,
};
use crate::core::tools::DEFAULT_TOOL_TIMEOUT;
use crate::core::transcript::DEFAULT_COALESCE_WINDOW;
use crate::core::turn::{CallerAudioPolicy, TurnDetectionMode, TurnSettings};

/// Default system prompt when an agent does not set one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful voice assistant.";

/// Turn-detection parameters for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTurnDetection {
    pub mode: TurnDetectionMode,
    /// Server VAD activation threshold (0.0 to 1.0)
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    /// Semantic VAD eagerness (low, medium, high, auto)
    pub eagerness: Option<String>,
    pub caller_audio_policy: CallerAudioPolicy,
    pub barge_in_replay_ms: u32,
}

impl Default for AgentTurnDetection {
    fn default() -> Self {
        Self {
            mode: TurnDetectionMode::Normal,
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            eagerness: None,
            caller_audio_policy: CallerAudioPolicy::Hold,
            barge_in_replay_ms: 300,
        }
    }
}

/// Snapshot of an agent's configuration, taken when the call starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(alias = "id")]
    pub agent_id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub voice: Option<String>,

    /// Upstream model override
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub turn_detection: AgentTurnDetection,

    /// Tools enabled for this agent
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,

    /// Whether transcripts are sent to the transcript sink
    #[serde(default = "default_true")]
    pub enable_transcript: bool,

    #[serde(default = "default_true", alias = "is_active")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: None,
            system_prompt: None,
            voice: None,
            model: None,
            temperature: None,
            turn_detection: AgentTurnDetection::default(),
            tools: Vec::new(),
            enable_transcript: true,
            active: true,
        }
    }

    /// Names of the tools the model may call.
    pub fn enabled_tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.agent_id.trim().is_empty() {
            return Err(SessionError::Configuration(
                "agent_id must not be empty".to_string(),
            ));
        }
        let td = &self.turn_detection;
        if !(0.0..=1.0).contains(&td.threshold) {
            return Err(SessionError::Configuration(format!(
                "turn_detection.threshold must be within 0.0..=1.0, got {}",
                td.threshold
            )));
        }
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(SessionError::Configuration(format!(
                "temperature must be within 0.0..=2.0, got {temperature}"
            )));
        }
        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.name().is_empty() {
                return Err(SessionError::Configuration(
                    "tool names must not be empty".to_string(),
                ));
            }
            if !names.insert(tool.name()) {
                return Err(SessionError::Configuration(format!(
                    "tool '{}' is listed twice",
                    tool.name()
                )));
            }
        }
        Ok(())
    }

    /// The session update sent upstream once the channel opens.
    ///
    /// Upstream turn detection stays on in `Disabled` mode; that mode only
    /// turns off local barge-in handling.
    pub fn session_settings(&self) -> SessionSettings {
        let td = &self.turn_detection;
        let turn_detection = match td.mode {
            TurnDetectionMode::Semantic => TurnDetectionConfig::SemanticVad {
                eagerness: td.eagerness.clone(),
            },
            TurnDetectionMode::Normal | TurnDetectionMode::Disabled => {
                TurnDetectionConfig::ServerVad {
                    threshold: Some(td.threshold),
                    prefix_padding_ms: Some(td.prefix_padding_ms),
                    silence_duration_ms: Some(td.silence_duration_ms),
                }
            }
        };

        SessionSettings {
            instructions: Some(
                self.system_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            ),
            voice: self.voice.clone(),
            turn_detection,
            tools: self.tools.clone(),
            temperature: self.temperature,
            ..Default::default()
        }
    }

    pub fn turn_settings(&self, frame_ms: u32) -> TurnSettings {
        TurnSettings {
            mode: self.turn_detection.mode,
            caller_audio_policy: self.turn_detection.caller_audio_policy,
            barge_in_replay_ms: self.turn_detection.barge_in_replay_ms,
            frame_ms,
        }
    }

    /// Per-call upstream configuration: the server's settings with this
    /// agent's model and conversation settings applied.
    pub fn realtime_config(&self, base: &RealtimeConfig) -> RealtimeConfig {
        let mut config = base.clone();
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        config.session = self.session_settings();
        config
    }
}

/// Timing and audio options shared by every session of a server.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Local channel PCM16 sample rate
    pub local_sample_rate: u32,
    /// Upstream PCM16 sample rate
    pub upstream_sample_rate: u32,
    /// Duration of one local frame
    pub frame_ms: u32,
    /// Bound on connect + session configuration acknowledgement
    pub connect_timeout: Duration,
    /// Bound on a single tool executor call
    pub tool_timeout: Duration,
    /// How long pending tool calls may finish during close
    pub tool_grace_period: Duration,
    /// Transcript fragment coalescing window
    pub coalesce_window: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            local_sample_rate: DEFAULT_LOCAL_SAMPLE_RATE,
            upstream_sample_rate: crate::core::realtime::OPENAI_REALTIME_SAMPLE_RATE,
            frame_ms: DEFAULT_FRAME_DURATION_MS,
            connect_timeout: Duration::from_secs(10),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            tool_grace_period: Duration::from_secs(2),
            coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> SessionResult<()> {
        AudioFormat::mono(self.local_sample_rate).validate()?;
        AudioFormat::mono(self.upstream_sample_rate).validate()?;
        if self.frame_ms == 0 {
            return Err(SessionError::Configuration(
                "frame duration must be positive".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() || self.tool_timeout.is_zero() {
            return Err(SessionError::Configuration(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
