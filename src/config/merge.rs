use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Build the final configuration: environment first, then YAML overrides.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, String> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) => {}
                    _ => {
                        return Err(
                            "server.tls requires both cert_path and key_path".to_string()
                        );
                    }
                }
            }
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(key) = realtime.api_key {
            config.openai_api_key = Some(key);
        }
        if let Some(url) = realtime.url {
            config.realtime_url = url;
        }
        if let Some(model) = realtime.model {
            config.realtime_model = model;
        }
        if let Some(ephemeral) = realtime.use_ephemeral_token {
            config.realtime_use_ephemeral_token = ephemeral;
        }
        if let Some(url) = realtime.credential_url {
            config.realtime_credential_url = Some(url);
        }
        if let Some(names) = realtime.event_names {
            config.event_names = names;
        }
        if let Some(types) = realtime.fatal_error_types {
            config.fatal_error_types = types;
        }
    }

    if let Some(session) = yaml.session {
        if let Some(rate) = session.local_sample_rate {
            config.local_sample_rate = rate;
        }
        if let Some(ms) = session.frame_duration_ms {
            config.frame_duration_ms = ms;
        }
        if let Some(ms) = session.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = session.tool_timeout_ms {
            config.tool_timeout_ms = ms;
        }
        if let Some(ms) = session.tool_grace_period_ms {
            config.tool_grace_period_ms = ms;
        }
        if let Some(ms) = session.transcript_coalesce_ms {
            config.transcript_coalesce_ms = ms;
        }
    }

    if let Some(collaborators) = yaml.collaborators {
        if let Some(url) = collaborators.tool_executor_url {
            config.tool_executor_url = Some(url);
        }
        if let Some(url) = collaborators.transcript_sink_url {
            config.transcript_sink_url = Some(url);
        }
        if let Some(url) = collaborators.agent_directory_url {
            config.agent_directory_url = Some(url);
        }
        if let Some(key) = collaborators.api_key {
            config.collaborator_api_key = Some(key);
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(max) = security.max_sessions {
            config.max_sessions = Some(max);
        }
    }

    if !yaml.agents.is_empty() {
        config.agents = yaml.agents;
    }

    Ok(config)
}
