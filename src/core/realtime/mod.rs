//! Upstream model channel.
//!
//! The session drives a provider only through [`BaseRealtime`]. Wire names
//! live in [`EventNames`], so swapping the provider or API revision does not
//! touch session logic. Providers are picked by name with
//! [`create_realtime_provider`].

mod base;
pub mod credentials;
mod events;
pub mod openai;

use reqwest::Client;

pub use base::{
    BaseRealtime, BoxedRealtime, FunctionDefinition, InputTranscriptionConfig, RealtimeConfig,
    RealtimeError, RealtimeResult, SessionSettings, ToolDefinition, TurnDetectionConfig,
    default_fatal_error_types,
};
pub use credentials::{CredentialMode, UpstreamCredential};
pub use events::{ControlEvent, EventNames, InboundKind, ModelEvent, ResponseStatus};
pub use openai::{OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtime};

/// Upstream providers the bridge can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeProvider {
    OpenAI,
}

impl RealtimeProvider {
    pub const ALL: &'static [RealtimeProvider] = &[RealtimeProvider::OpenAI];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeProvider::OpenAI => "openai",
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the upstream channel for one call.
///
/// `http` is used for credential exchange and is shared across calls.
pub fn create_realtime_provider(
    provider_type: &str,
    config: RealtimeConfig,
    http: &Client,
) -> RealtimeResult<BoxedRealtime> {
    let provider = RealtimeProvider::parse(provider_type).ok_or_else(|| {
        let supported: Vec<&str> = RealtimeProvider::ALL.iter().map(|p| p.as_str()).collect();
        RealtimeError::InvalidConfiguration(format!(
            "Unsupported realtime provider: {provider_type}. Supported providers: {}",
            supported.join(", ")
        ))
    })?;
    match provider {
        RealtimeProvider::OpenAI => Ok(Box::new(
            OpenAIRealtime::new(config)?.with_http_client(http.clone()),
        )),
    }
}
