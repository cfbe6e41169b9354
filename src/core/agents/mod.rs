//! Agent configuration source.
//!
//! Agents are owned by the CRUD layer. The bridge only looks one up when a
//! call starts and takes a snapshot; later edits do not affect running calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::core::session::AgentConfig;

/// Errors from agent lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("agent '{0}' not found")]
    NotFound(String),

    #[error("agent '{0}' is not active")]
    Inactive(String),

    #[error("agent directory unreachable: {0}")]
    Transport(String),

    #[error("invalid agent configuration: {0}")]
    Invalid(String),
}

/// Looks up agent configuration by id.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Fetch the raw configuration, active or not.
    async fn fetch(&self, agent_id: &str) -> Result<AgentConfig, DirectoryError>;

    /// Fetch an agent that may take calls.
    async fn lookup(&self, agent_id: &str) -> Result<AgentConfig, DirectoryError> {
        let agent = self.fetch(agent_id).await?;
        if !agent.active {
            return Err(DirectoryError::Inactive(agent_id.to_string()));
        }
        agent
            .validate()
            .map_err(|e| DirectoryError::Invalid(e.to_string()))?;
        Ok(agent)
    }
}

pub type SharedAgentDirectory = Arc<dyn AgentDirectory>;

// =============================================================================
// Static directory
// =============================================================================

/// Agents listed in the server configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAgentDirectory {
    agents: HashMap<String, AgentConfig>,
}

impl StaticAgentDirectory {
    pub fn new(agents: impl IntoIterator<Item = AgentConfig>) -> Self {
        Self {
            agents: agents
                .into_iter()
                .map(|agent| (agent.agent_id.clone(), agent))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[async_trait]
impl AgentDirectory for StaticAgentDirectory {
    async fn fetch(&self, agent_id: &str) -> Result<AgentConfig, DirectoryError> {
        self.agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(agent_id.to_string()))
    }
}

// =============================================================================
// HTTP directory
// =============================================================================

/// Fetches agents from the CRUD layer: `GET {base}/api/v1/agents/{agent_id}`.
#[derive(Debug, Clone)]
pub struct HttpAgentDirectory {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAgentDirectory {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| DirectoryError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl AgentDirectory for HttpAgentDirectory {
    async fn fetch(&self, agent_id: &str) -> Result<AgentConfig, DirectoryError> {
        let url = format!("{}/api/v1/agents/{}", self.base_url, agent_id);
        debug!(%url, "Fetching agent configuration");

        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(agent_id.to_string())),
            status if !status.is_success() => Err(DirectoryError::Transport(format!(
                "directory returned {status}"
            ))),
            _ => response
                .json::<AgentConfig>()
                .await
                .map_err(|e| DirectoryError::Invalid(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup() {
        let directory = StaticAgentDirectory::new([AgentConfig::new("agent-1")]);
        assert_eq!(directory.len(), 1);
        assert_eq!(
            directory.lookup("agent-1").await.unwrap().agent_id,
            "agent-1"
        );
        assert_eq!(
            directory.lookup("missing").await,
            Err(DirectoryError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_inactive_agent_rejected() {
        let mut agent = AgentConfig::new("agent-2");
        agent.active = false;
        let directory = StaticAgentDirectory::new([agent]);

        assert!(directory.fetch("agent-2").await.is_ok());
        assert_eq!(
            directory.lookup("agent-2").await,
            Err(DirectoryError::Inactive("agent-2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_invalid_agent_rejected() {
        let mut agent = AgentConfig::new("agent-3");
        agent.temperature = Some(5.0);
        let directory = StaticAgentDirectory::new([agent]);
        assert!(matches!(
            directory.lookup("agent-3").await,
            Err(DirectoryError::Invalid(_))
        ));
    }
}
