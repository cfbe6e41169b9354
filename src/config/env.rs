use std::path::PathBuf;

use super::utils::{env_var, parse_env, parse_env_bool, parse_env_opt, split_list};
use super::{ServerConfig, TlsConfig};
use crate::core::audio::{DEFAULT_FRAME_DURATION_MS, DEFAULT_LOCAL_SAMPLE_RATE};
use crate::core::realtime::openai::{OPENAI_DEFAULT_MODEL, OPENAI_REALTIME_URL};
use crate::core::realtime::{EventNames, default_fatal_error_types};

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 3001;
pub(super) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub(super) const DEFAULT_TOOL_TIMEOUT_MS: u64 = 15_000;
pub(super) const DEFAULT_TOOL_GRACE_PERIOD_MS: u64 = 2_000;
pub(super) const DEFAULT_TRANSCRIPT_COALESCE_MS: u64 = 40;

/// Build a configuration from environment variables, applying defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, String> {
    let tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(
                "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
            );
        }
    };

    let fatal_error_types = env_var("REALTIME_FATAL_ERROR_TYPES")
        .map(|raw| split_list(&raw))
        .unwrap_or_else(default_fatal_error_types);

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT", DEFAULT_PORT)?,
        tls,

        openai_api_key: env_var("OPENAI_API_KEY"),
        realtime_url: env_var("REALTIME_URL").unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        realtime_model: env_var("REALTIME_MODEL")
            .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
        realtime_use_ephemeral_token: parse_env_bool("REALTIME_USE_EPHEMERAL_TOKEN", false)?,
        realtime_credential_url: env_var("REALTIME_CREDENTIAL_URL"),
        event_names: EventNames::default(),
        fatal_error_types,

        local_sample_rate: parse_env("LOCAL_SAMPLE_RATE", DEFAULT_LOCAL_SAMPLE_RATE)?,
        frame_duration_ms: parse_env("FRAME_DURATION_MS", DEFAULT_FRAME_DURATION_MS)?,
        connect_timeout_ms: parse_env("CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?,
        tool_timeout_ms: parse_env("TOOL_TIMEOUT_MS", DEFAULT_TOOL_TIMEOUT_MS)?,
        tool_grace_period_ms: parse_env("TOOL_GRACE_PERIOD_MS", DEFAULT_TOOL_GRACE_PERIOD_MS)?,
        transcript_coalesce_ms: parse_env(
            "TRANSCRIPT_COALESCE_MS",
            DEFAULT_TRANSCRIPT_COALESCE_MS,
        )?,

        tool_executor_url: env_var("TOOL_EXECUTOR_URL"),
        transcript_sink_url: env_var("TRANSCRIPT_SINK_URL"),
        agent_directory_url: env_var("AGENT_DIRECTORY_URL"),
        collaborator_api_key: env_var("COLLABORATOR_API_KEY"),
        agents: Vec::new(),

        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        max_sessions: parse_env_opt("MAX_SESSIONS")?,
    })
}
