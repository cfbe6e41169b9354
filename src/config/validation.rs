use std::collections::HashSet;

use url::Url;

use super::ServerConfig;
use crate::core::audio::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// Validate a merged configuration.
pub(super) fn validate_config(config: &ServerConfig) -> Result<(), String> {
    validate_audio(config)?;
    validate_timeouts(config)?;
    validate_urls(config)?;
    validate_agents(config)?;
    config
        .event_names
        .validate()
        .map_err(|e| format!("Invalid realtime.event_names: {e}"))?;
    if config.max_sessions == Some(0) {
        return Err("MAX_SESSIONS must be greater than zero".to_string());
    }
    Ok(())
}

fn validate_audio(config: &ServerConfig) -> Result<(), String> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.local_sample_rate) {
        return Err(format!(
            "LOCAL_SAMPLE_RATE must be within {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}, got {}",
            config.local_sample_rate
        ));
    }
    if config.frame_duration_ms == 0 {
        return Err("FRAME_DURATION_MS must be greater than zero".to_string());
    }
    Ok(())
}

fn validate_timeouts(config: &ServerConfig) -> Result<(), String> {
    for (name, value) in [
        ("CONNECT_TIMEOUT_MS", config.connect_timeout_ms),
        ("TOOL_TIMEOUT_MS", config.tool_timeout_ms),
    ] {
        if value == 0 {
            return Err(format!("{name} must be greater than zero"));
        }
    }
    Ok(())
}

fn validate_urls(config: &ServerConfig) -> Result<(), String> {
    check_url("REALTIME_URL", &config.realtime_url, &["ws", "wss"])?;
    let http_urls = [
        ("REALTIME_CREDENTIAL_URL", &config.realtime_credential_url),
        ("TOOL_EXECUTOR_URL", &config.tool_executor_url),
        ("TRANSCRIPT_SINK_URL", &config.transcript_sink_url),
        ("AGENT_DIRECTORY_URL", &config.agent_directory_url),
    ];
    for (name, value) in http_urls {
        if let Some(value) = value {
            check_url(name, value, &["http", "https"])?;
        }
    }
    Ok(())
}

fn check_url(name: &str, value: &str, schemes: &[&str]) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    if !schemes.contains(&url.scheme()) {
        return Err(format!(
            "{name} must use one of {schemes:?}, got '{}'",
            url.scheme()
        ));
    }
    if url.host_str().is_none() {
        return Err(format!("{name} must have a host"));
    }
    Ok(())
}

fn validate_agents(config: &ServerConfig) -> Result<(), String> {
    let mut seen = HashSet::new();
    for agent in &config.agents {
        if !seen.insert(agent.agent_id.as_str()) {
            return Err(format!("Duplicate agent id '{}'", agent.agent_id));
        }
        agent
            .validate()
            .map_err(|e| format!("Invalid agent '{}': {e}", agent.agent_id))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_url_schemes_checked() {
        let mut config = ServerConfig::default();
        config.realtime_url = "https://api.openai.com/v1/realtime".to_string();
        assert!(validate_config(&config).unwrap_err().contains("REALTIME_URL"));

        let mut config = ServerConfig::default();
        config.tool_executor_url = Some("backend:8000".to_string());
        assert!(
            validate_config(&config)
                .unwrap_err()
                .contains("TOOL_EXECUTOR_URL")
        );

        let mut config = ServerConfig::default();
        config.agent_directory_url = Some("http://backend:8000".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = ServerConfig::default();
        config.tool_timeout_ms = 0;
        assert!(validate_config(&config).unwrap_err().contains("TOOL_TIMEOUT_MS"));
    }
}
