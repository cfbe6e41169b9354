use std::path::Path;

use serde::Deserialize;

use crate::core::realtime::EventNames;
use crate::core::session::AgentConfig;

/// Bridge configuration as written in a YAML file.
///
/// Every section is optional and anything left out falls back to the
/// environment, then to defaults. A minimal file:
///
/// ```yaml
/// server:
///   port: 3001
///
/// realtime:
///   model: "gpt-4o-realtime-preview"
///   use_ephemeral_token: true
///   event_names:
///     response_done: "response.done"
///
/// session:
///   frame_duration_ms: 20
///   tool_grace_period_ms: 2000
///
/// collaborators:
///   tool_executor_url: "http://crud:8000"
///
/// agents:
///   - id: "support"
///     system_prompt: "You help customers."
///     tools:
///       - function:
///           name: "lookup_contact"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub session: Option<SessionYaml>,
    pub collaborators: Option<CollaboratorsYaml>,
    pub security: Option<SecurityYaml>,
    pub agents: Vec<AgentConfig>,
}

/// `server:` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// `server.tls:`; `enabled: false` turns TLS off even when env sets paths
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Upstream realtime endpoint from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub use_ephemeral_token: Option<bool>,
    pub credential_url: Option<String>,
    /// Partial tables are filled in with the OpenAI Realtime names
    pub event_names: Option<EventNames>,
    pub fatal_error_types: Option<Vec<String>>,
}

/// Session timing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub local_sample_rate: Option<u32>,
    pub frame_duration_ms: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub tool_timeout_ms: Option<u64>,
    pub tool_grace_period_ms: Option<u64>,
    pub transcript_coalesce_ms: Option<u64>,
}

/// Collaborator endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CollaboratorsYaml {
    pub tool_executor_url: Option<String>,
    pub transcript_sink_url: Option<String>,
    pub agent_directory_url: Option<String>,
    pub api_key: Option<String>,
}

/// `security:` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub max_sessions: Option<usize>,
}

impl YamlConfig {
    /// Read and parse a config file. Unknown keys are ignored.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| format!("invalid YAML in {}: {e}", path.display()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  tls:
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"

realtime:
  api_key: "sk-test"
  url: "wss://proxy.example.com/realtime"
  use_ephemeral_token: true
  fatal_error_types: ["server_error"]
  event_names:
    output_audio_delta: "response.output_audio.delta"

session:
  local_sample_rate: 16000
  frame_duration_ms: 10

collaborators:
  tool_executor_url: "http://crud:8000"
  api_key: "internal"

security:
  max_sessions: 10

agents:
  - id: "a1"
    voice: "alloy"
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.tls.unwrap().cert_path.as_deref(), Some("/tmp/cert.pem"));

        let realtime = config.realtime.unwrap();
        assert_eq!(realtime.use_ephemeral_token, Some(true));
        let names = realtime.event_names.unwrap();
        assert_eq!(names.output_audio_delta, "response.output_audio.delta");
        assert_eq!(names.error, "error");

        assert_eq!(config.session.unwrap().frame_duration_ms, Some(10));
        assert_eq!(
            config.collaborators.unwrap().tool_executor_url.as_deref(),
            Some("http://crud:8000")
        );
        assert_eq!(config.security.unwrap().max_sessions, Some(10));
        assert_eq!(config.agents[0].voice.as_deref(), Some("alloy"));
    }

    #[test]
    fn test_empty_document_has_no_sections() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.realtime.is_none());
        assert!(config.collaborators.is_none());
        assert!(config.agents.is_empty());
    }

    #[test]
    fn test_tls_can_be_switched_off() {
        let config: YamlConfig =
            serde_yaml::from_str("server:\n  tls:\n    enabled: false\n").unwrap();
        let tls = config.server.and_then(|s| s.tls).unwrap();
        assert_eq!(tls.enabled, Some(false));
        assert!(tls.cert_path.is_none());
    }

    #[test]
    fn test_read_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bridge.yaml");
        std::fs::write(&path, "session:\n  tool_timeout_ms: 500\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(config.session.unwrap().tool_timeout_ms, Some(500));
    }

    #[test]
    fn test_file_errors_name_the_path() {
        let missing = YamlConfig::from_file(Path::new("/nonexistent/bridge.yaml")).unwrap_err();
        assert!(missing.to_string().starts_with("cannot read /nonexistent/bridge.yaml"));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "agents: [").unwrap();
        let broken = YamlConfig::from_file(&path).unwrap_err();
        assert!(broken.to_string().starts_with("invalid YAML in"));
    }
}
