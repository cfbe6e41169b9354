//! External tool executor client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Path of the executor endpoint on the CRUD layer.
pub const TOOL_EXECUTE_PATH: &str = "/api/v1/tools/execute";

/// Errors from a single tool invocation.
///
/// These never escape the dispatcher: every one of them becomes a
/// `{"success": false, "error": ...}` function-call output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolExecutionError {
    #[error("tool call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Executor(String),

    #[error("tool executor unreachable: {0}")]
    Transport(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool '{0}' is not enabled for this agent")]
    NotEnabled(String),
}

/// Request sent to the tool executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    pub arguments: Value,
    pub agent_id: String,
}

/// Response returned by the tool executor.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn into_result(self) -> Result<Value, ToolExecutionError> {
        if self.success {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(ToolExecutionError::Executor(
                self.error
                    .unwrap_or_else(|| "tool reported failure".to_string()),
            ))
        }
    }
}

/// A request/response collaborator that runs tools by name.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, request: ToolRequest) -> Result<Value, ToolExecutionError>;
}

pub type SharedToolExecutor = Arc<dyn ToolExecutor>;

// =============================================================================
// HTTP executor
// =============================================================================

/// Calls the tool executor over HTTP.
#[derive(Debug, Clone)]
pub struct HttpToolExecutor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpToolExecutor {
    /// `base_url` is the CRUD layer root, e.g. `http://backend:8000`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ToolExecutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| {
                ToolExecutionError::Transport(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), TOOL_EXECUTE_PATH),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn execute(&self, request: ToolRequest) -> Result<Value, ToolExecutionError> {
        debug!(tool_name = %request.tool_name, endpoint = %self.endpoint, "Executing tool");

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolExecutionError::Transport(format!("request timed out: {e}"))
            } else {
                ToolExecutionError::Transport(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolExecutionError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            // Prefer the executor's own error message when it sent one
            if let Ok(parsed) = serde_json::from_str::<ToolResponse>(&body)
                && let Some(error) = parsed.error
            {
                return Err(ToolExecutionError::Executor(error));
            }
            return Err(ToolExecutionError::Executor(format!(
                "executor returned {status}"
            )));
        }

        serde_json::from_str::<ToolResponse>(&body)
            .map_err(|e| ToolExecutionError::Executor(format!("invalid executor response: {e}")))?
            .into_result()
    }
}

/// Executor used when no tool backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableToolExecutor;

#[async_trait]
impl ToolExecutor for UnavailableToolExecutor {
    async fn execute(&self, request: ToolRequest) -> Result<Value, ToolExecutionError> {
        Err(ToolExecutionError::Executor(format!(
            "no tool executor configured for '{}'",
            request.tool_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = ToolRequest {
            tool_name: "lookup_contact".to_string(),
            arguments: json!({"phone": "+15551234567"}),
            agent_id: "agent-1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "tool_name": "lookup_contact",
                "arguments": {"phone": "+15551234567"},
                "agent_id": "agent-1"
            })
        );
    }

    #[test]
    fn test_response_into_result() {
        let ok: ToolResponse =
            serde_json::from_value(json!({"success": true, "result": {"name": "Jane Doe"}}))
                .unwrap();
        assert_eq!(ok.into_result().unwrap(), json!({"name": "Jane Doe"}));

        let failed: ToolResponse =
            serde_json::from_value(json!({"success": false, "error": "not found"})).unwrap();
        assert_eq!(
            failed.into_result().unwrap_err(),
            ToolExecutionError::Executor("not found".to_string())
        );
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let executor =
            HttpToolExecutor::new("http://backend:8000/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            executor.endpoint(),
            "http://backend:8000/api/v1/tools/execute"
        );
    }

    #[tokio::test]
    async fn test_unavailable_executor_fails() {
        let result = UnavailableToolExecutor
            .execute(ToolRequest {
                tool_name: "x".to_string(),
                arguments: Value::Null,
                agent_id: "a".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ToolExecutionError::Executor(_))));
    }
}
