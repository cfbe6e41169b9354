//! Configuration module for the voice agent bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voice_agent_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::audio::{DEFAULT_FRAME_DURATION_MS, DEFAULT_LOCAL_SAMPLE_RATE};
use crate::core::realtime::openai::{OPENAI_DEFAULT_MODEL, OPENAI_REALTIME_URL};
use crate::core::realtime::{CredentialMode, EventNames, RealtimeConfig, default_fatal_error_types};
use crate::core::session::{AgentConfig, SessionOptions};

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge, including:
/// - Server settings (host, port, TLS)
/// - Upstream realtime endpoint and credentials
/// - Session timing (frame size, timeouts, transcript coalescing)
/// - Collaborator endpoints (tool executor, transcript sink, agent directory)
/// - Security settings (CORS, session limit)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Upstream realtime endpoint
    /// API key for the realtime model provider
    pub openai_api_key: Option<String>,
    pub realtime_url: String,
    pub realtime_model: String,
    /// Exchange the API key for an ephemeral client secret before connecting
    pub realtime_use_ephemeral_token: bool,
    /// Ephemeral session endpoint (defaults to the OpenAI sessions endpoint)
    pub realtime_credential_url: Option<String>,
    /// Wire names of upstream events (YAML only)
    pub event_names: EventNames,
    /// Upstream error types that end a session
    pub fatal_error_types: Vec<String>,

    // Session timing
    /// Local PCM16 sample rate. Default: 24000
    pub local_sample_rate: u32,
    /// Duration of one local frame. Default: 20
    pub frame_duration_ms: u32,
    /// Default: 10000
    pub connect_timeout_ms: u64,
    /// Default: 15000
    pub tool_timeout_ms: u64,
    /// Default: 2000
    pub tool_grace_period_ms: u64,
    /// Default: 40
    pub transcript_coalesce_ms: u64,

    // Collaborators
    pub tool_executor_url: Option<String>,
    pub transcript_sink_url: Option<String>,
    pub agent_directory_url: Option<String>,
    /// Bearer token sent to the tool executor, transcript sink and agent directory
    pub collaborator_api_key: Option<String>,
    /// Static agents, used when no directory URL is configured (YAML only)
    pub agents: Vec<AgentConfig>,

    // Security settings
    /// Comma-separated allowed origins, or "*"
    pub cors_allowed_origins: Option<String>,
    /// Maximum concurrent sessions
    /// Default: None (unlimited)
    pub max_sessions: Option<usize>,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.collaborator_api_key {
            key.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::DEFAULT_HOST.to_string(),
            port: env::DEFAULT_PORT,
            tls: None,
            openai_api_key: None,
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            realtime_model: OPENAI_DEFAULT_MODEL.to_string(),
            realtime_use_ephemeral_token: false,
            realtime_credential_url: None,
            event_names: EventNames::default(),
            fatal_error_types: default_fatal_error_types(),
            local_sample_rate: DEFAULT_LOCAL_SAMPLE_RATE,
            frame_duration_ms: DEFAULT_FRAME_DURATION_MS,
            connect_timeout_ms: env::DEFAULT_CONNECT_TIMEOUT_MS,
            tool_timeout_ms: env::DEFAULT_TOOL_TIMEOUT_MS,
            tool_grace_period_ms: env::DEFAULT_TOOL_GRACE_PERIOD_MS,
            transcript_coalesce_ms: env::DEFAULT_TRANSCRIPT_COALESCE_MS,
            tool_executor_url: None,
            transcript_sink_url: None,
            agent_directory_url: None,
            collaborator_api_key: None,
            agents: Vec::new(),
            cors_allowed_origins: None,
            max_sessions: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and a `.env` file,
    /// which `main.rs` loads at startup), then validate it.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string ("host:port")
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Base upstream configuration. Per-agent settings are applied on top
    /// with [`AgentConfig::realtime_config`].
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            provider: "openai".to_string(),
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            credential_mode: if self.realtime_use_ephemeral_token {
                CredentialMode::EphemeralToken
            } else {
                CredentialMode::StaticApiKey
            },
            credential_url: self.realtime_credential_url.clone(),
            event_names: self.event_names.clone(),
            fatal_error_types: self.fatal_error_types.clone(),
            ..Default::default()
        }
    }

    /// Timing and audio options applied to every session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            local_sample_rate: self.local_sample_rate,
            frame_ms: self.frame_duration_ms,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            tool_timeout: Duration::from_millis(self.tool_timeout_ms),
            tool_grace_period: Duration::from_millis(self.tool_grace_period_ms),
            coalesce_window: Duration::from_millis(self.transcript_coalesce_ms),
            ..Default::default()
        }
    }

    /// Timeout for calls to HTTP collaborators other than the tool executor.
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
