use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::agents::{HttpAgentDirectory, SharedAgentDirectory, StaticAgentDirectory};
use crate::core::realtime::credentials::{credential_client, request_ephemeral_token};
use crate::core::realtime::{
    BoxedRealtime, RealtimeConfig, RealtimeResult, UpstreamCredential, create_realtime_provider,
};
use crate::core::session::{
    AgentConfig, BoxedLocalChannel, CallSummary, HttpSink, SessionDeps, SessionHandle,
    SessionState, SharedTranscriptSink, TracingSink, VoiceSession,
};
use crate::core::tools::{HttpToolExecutor, SharedToolExecutor, UnavailableToolExecutor};
use crate::errors::{AppError, AppResult};

/// Builds the upstream connection for one call.
pub type UpstreamFactory =
    Arc<dyn Fn(RealtimeConfig) -> RealtimeResult<BoxedRealtime> + Send + Sync>;

/// Registry entry as exposed by `GET /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub agent_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub state: SessionState,
}

/// A reserved place under `MAX_SESSIONS`. Released on drop.
#[derive(Debug)]
pub struct SessionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Application state that can be shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub directory: SharedAgentDirectory,
    pub executor: SharedToolExecutor,
    pub sink: SharedTranscriptSink,
    upstream_factory: UpstreamFactory,
    credential_client: Client,
    sessions: DashMap<String, SessionHandle>,
    active: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Build the state with collaborators chosen from the configuration.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let api_key = config.collaborator_api_key.clone();
        let timeout = config.collaborator_timeout();

        let directory: SharedAgentDirectory = match &config.agent_directory_url {
            Some(url) => {
                info!(%url, "Using HTTP agent directory");
                Arc::new(HttpAgentDirectory::new(url, api_key.clone(), timeout)?)
            }
            None => {
                let directory = StaticAgentDirectory::new(config.agents.clone());
                info!(agents = directory.len(), "Using static agent directory");
                Arc::new(directory)
            }
        };

        let executor: SharedToolExecutor = match &config.tool_executor_url {
            Some(url) => Arc::new(HttpToolExecutor::new(
                url,
                api_key.clone(),
                Duration::from_millis(config.tool_timeout_ms),
            )?),
            None => {
                warn!("TOOL_EXECUTOR_URL not set, tool calls will fail");
                Arc::new(UnavailableToolExecutor)
            }
        };

        let sink: SharedTranscriptSink = match &config.transcript_sink_url {
            Some(url) => Arc::new(HttpSink::new(url, api_key, timeout)?),
            None => Arc::new(TracingSink),
        };

        // One pooled client for every call's credential exchange
        let upstream_http = credential_client(timeout)?;
        let upstream_factory: UpstreamFactory = Arc::new(move |config: RealtimeConfig| {
            let provider = config.provider.clone();
            create_realtime_provider(&provider, config, &upstream_http)
        });

        Self::with_collaborators(config, directory, executor, sink, upstream_factory)
    }

    /// Build the state with explicit collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        directory: SharedAgentDirectory,
        executor: SharedToolExecutor,
        sink: SharedTranscriptSink,
        upstream_factory: UpstreamFactory,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let credential_client = credential_client(config.collaborator_timeout())?;
        Ok(Arc::new(Self {
            config,
            directory,
            executor,
            sink,
            upstream_factory,
            credential_client,
            sessions: DashMap::new(),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }))
    }

    /// Look up an agent that may take calls.
    pub async fn lookup_agent(&self, agent_id: &str) -> AppResult<AgentConfig> {
        Ok(self.directory.lookup(agent_id).await?)
    }

    /// Reserve room for one more session.
    pub fn reserve_slot(&self) -> AppResult<SessionSlot> {
        if self.shutdown.is_cancelled() {
            return Err(AppError::ServiceUnavailable(
                "server is shutting down".to_string(),
            ));
        }
        let max = self.config.max_sessions.unwrap_or(usize::MAX);
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < max).then_some(active + 1)
            })
            .map_err(|active| {
                AppError::ServiceUnavailable(format!("{active} sessions active, limit {max}"))
            })?;
        Ok(SessionSlot {
            active: self.active.clone(),
        })
    }

    /// Build, register and run one call. Returns once the call is over.
    pub async fn run_session(
        &self,
        slot: SessionSlot,
        agent: AgentConfig,
        local: BoxedLocalChannel,
    ) -> AppResult<CallSummary> {
        let upstream_config = agent.realtime_config(&self.config.realtime_config());
        let upstream = (self.upstream_factory)(upstream_config)?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let session = VoiceSession::new(
            session_id.clone(),
            agent,
            self.config.session_options(),
            local,
            SessionDeps {
                upstream,
                executor: self.executor.clone(),
                sink: self.sink.clone(),
            },
        )
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .with_cancellation(self.shutdown.child_token());

        self.sessions.insert(session_id.clone(), session.handle());
        let summary = session.run().await;
        self.sessions.remove(&session_id);
        drop(slot);

        Ok(summary)
    }

    /// Sessions currently registered.
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| {
                let handle = entry.value();
                SessionInfo {
                    session_id: handle.session_id.clone(),
                    agent_id: handle.agent_id.clone(),
                    started_at: handle.started_at,
                    state: handle.state(),
                }
            })
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn session_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Ask one session to close.
    pub fn cancel_session(&self, session_id: &str) -> bool {
        match self.sessions.get(session_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Mint an ephemeral upstream credential for a browser client.
    pub async fn issue_token(&self, agent: &AgentConfig) -> AppResult<UpstreamCredential> {
        let config = agent.realtime_config(&self.config.realtime_config());
        if config.api_key.is_empty() {
            return Err(AppError::InternalServerError(
                "upstream API key is not configured".to_string(),
            ));
        }
        Ok(request_ephemeral_token(&self.credential_client, &config).await?)
    }

    /// Token cancelled on shutdown; every session holds a child of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel every session and wait for them to finish closing.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        let handles: Vec<SessionHandle> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        if handles.is_empty() {
            return;
        }
        info!(sessions = handles.len(), "Closing active sessions");

        let wait = join_all(handles.into_iter().map(|mut handle| async move {
            handle.closed().await;
        }));
        if tokio::time::timeout(grace, wait).await.is_err() {
            warn!(
                remaining = self.sessions.len(),
                "Sessions did not close within the shutdown grace period"
            );
        }
    }
}
