use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::executor::{SharedToolExecutor, ToolExecutionError, ToolRequest};
use crate::core::session::ProtocolError;

/// Default timeout for a single executor call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Answered call ids remembered for duplicate detection.
const SEEN_CALL_IDS: usize = 256;

/// Result of one tool invocation, ready to be folded back into the conversation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub result: Result<Value, ToolExecutionError>,
    pub elapsed: Duration,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The structured payload sent upstream as the function-call output.
    pub fn output(&self) -> Value {
        match &self.result {
            Ok(result) => json!({ "success": true, "result": result }),
            Err(error) => json!({ "success": false, "error": error.to_string() }),
        }
    }

    /// `output()` serialized, as the upstream expects a string.
    pub fn output_json(&self) -> String {
        self.output().to_string()
    }
}

#[derive(Debug)]
struct OpenInvocation {
    tool_name: String,
    started: Instant,
}

/// Correlates function-call requests with executor calls.
///
/// Every accepted request produces exactly one [`ToolOutcome`], whether the
/// executor succeeds, fails, times out, or is never called because the
/// arguments could not be parsed.
pub struct ToolDispatcher {
    agent_id: String,
    enabled: HashSet<String>,
    executor: SharedToolExecutor,
    timeout: Duration,
    open: HashMap<String, OpenInvocation>,
    seen: HashSet<String>,
    /// Insertion order of `seen`, oldest first
    seen_order: VecDeque<String>,
    tasks: JoinSet<ToolOutcome>,
}

impl ToolDispatcher {
    pub fn new(
        agent_id: impl Into<String>,
        enabled: impl IntoIterator<Item = String>,
        executor: SharedToolExecutor,
        timeout: Duration,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            enabled: enabled.into_iter().collect(),
            executor,
            timeout,
            open: HashMap::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Accept a function-call request and start its invocation.
    ///
    /// Rejects a call id that is already open or was already answered.
    pub fn on_function_call_request(
        &mut self,
        call_id: &str,
        tool_name: &str,
        arguments_json: &str,
    ) -> Result<(), ProtocolError> {
        if self.open.contains_key(call_id) || self.seen.contains(call_id) {
            return Err(ProtocolError::DuplicateCallId(call_id.to_string()));
        }
        self.remember(call_id);
        self.open.insert(
            call_id.to_string(),
            OpenInvocation {
                tool_name: tool_name.to_string(),
                started: Instant::now(),
            },
        );

        let call_id = call_id.to_string();
        let tool_name = tool_name.to_string();

        if !self.enabled.contains(&tool_name) {
            warn!(%call_id, %tool_name, "Model requested a tool that is not enabled");
            let error = ToolExecutionError::NotEnabled(tool_name.clone());
            self.spawn_ready(call_id, tool_name, error);
            return Ok(());
        }

        let arguments = match parse_arguments(arguments_json) {
            Ok(arguments) => arguments,
            Err(error) => {
                warn!(%call_id, %tool_name, %error, "Unparseable tool arguments");
                self.spawn_ready(call_id, tool_name, error);
                return Ok(());
            }
        };

        info!(%call_id, %tool_name, "Dispatching tool call");

        let executor = self.executor.clone();
        let timeout = self.timeout;
        let request = ToolRequest {
            tool_name: tool_name.clone(),
            arguments,
            agent_id: self.agent_id.clone(),
        };

        self.tasks.spawn(async move {
            let started = Instant::now();
            let call = AssertUnwindSafe(executor.execute(request)).catch_unwind();
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(ToolExecutionError::Executor(
                    "tool executor panicked".to_string(),
                )),
                Err(_) => Err(ToolExecutionError::Timeout(timeout)),
            };
            ToolOutcome {
                call_id,
                tool_name,
                result,
                elapsed: started.elapsed(),
            }
        });
        Ok(())
    }

    /// Wait for the next finished invocation.
    ///
    /// Returns `None` when nothing is running.
    pub async fn next_outcome(&mut self) -> Option<ToolOutcome> {
        loop {
            match self.tasks.join_next().await? {
                Ok(outcome) => return Some(outcome),
                Err(e) => {
                    // Only aborted tasks end up here
                    debug!(error = %e, "Tool task ended without an outcome");
                }
            }
        }
    }

    /// Close the invocation for a finished outcome.
    ///
    /// A call id with no open invocation is reported as `UnknownCallId`; the
    /// caller logs it and drops the outcome instead of resubmitting it.
    pub fn complete(&mut self, outcome: &ToolOutcome) -> Result<(), ProtocolError> {
        match self.open.remove(&outcome.call_id) {
            Some(invocation) => {
                info!(
                    call_id = %outcome.call_id,
                    tool_name = %invocation.tool_name,
                    success = outcome.is_success(),
                    elapsed_ms = invocation.started.elapsed().as_millis() as u64,
                    "Tool call finished"
                );
                Ok(())
            }
            None => Err(ProtocolError::UnknownCallId(outcome.call_id.clone())),
        }
    }

    /// Abort everything still running and forget the open invocations.
    pub fn abandon_all(&mut self) -> Vec<String> {
        self.tasks.abort_all();
        self.seen.clear();
        self.seen_order.clear();
        let abandoned: Vec<String> = self.open.drain().map(|(call_id, _)| call_id).collect();
        for call_id in &abandoned {
            warn!(%call_id, "Abandoning tool call");
        }
        abandoned
    }

    pub fn has_pending(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.open.len()
    }

    fn remember(&mut self, call_id: &str) {
        if self.seen_order.len() == SEEN_CALL_IDS
            && let Some(oldest) = self.seen_order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(call_id.to_string());
        self.seen_order.push_back(call_id.to_string());
    }

    fn spawn_ready(&mut self, call_id: String, tool_name: String, error: ToolExecutionError) {
        self.tasks.spawn(async move {
            ToolOutcome {
                call_id,
                tool_name,
                result: Err(error),
                elapsed: Duration::ZERO,
            }
        });
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("agent_id", &self.agent_id)
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .field("open", &self.open.len())
            .field("seen", &self.seen.len())
            .finish()
    }
}

fn parse_arguments(arguments_json: &str) -> Result<Value, ToolExecutionError> {
    if arguments_json.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(arguments_json)
        .map_err(|e| ToolExecutionError::InvalidArguments(e.to_string()))
}
