//! OpenAI Realtime data channel.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events, see [`OpenAIProtocol`]
//! - Audio: PCM16 mono 24 kHz, base64 encoded
//!
//! ```rust,ignore
//! use voice_agent_bridge::core::realtime::{BaseRealtime, ControlEvent, OpenAIRealtime, RealtimeConfig};
//!
//! let mut realtime = OpenAIRealtime::new(RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     ..Default::default()
//! })?;
//! let mut events = realtime.connect().await?;
//! realtime.send_control(ControlEvent::ResponseCreate).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};
use url::Url;

use super::messages::OpenAIProtocol;
use crate::core::realtime::base::{BaseRealtime, RealtimeConfig, RealtimeError, RealtimeResult};
use crate::core::realtime::credentials::{acquire_credential, credential_client};
use crate::core::realtime::events::{ControlEvent, ModelEvent};

/// Capacity of the inbound event channel handed to the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the control lane.
const CONTROL_CHANNEL_CAPACITY: usize = 32;

/// Capacity of the audio lane, in chunks. At 20ms frames this is a little
/// over a second of caller audio.
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// Timeout for the credential exchange when no client is supplied.
const CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `disconnect` waits for the close handshake before aborting.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One call's channel to the OpenAI Realtime API.
///
/// One connection task owns the socket. Control events and audio reach it on
/// separate lanes and the task always drains the control lane first, so a
/// cancellation is never stuck behind queued audio.
///
/// There is no automatic reconnection: when the socket ends the event
/// stream ends and the session decides what to do.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    /// Client for the credential exchange, shared across calls when given
    http: Option<Client>,
    /// Cleared by the connection task when the socket ends
    connected: Arc<AtomicBool>,
    control_tx: Option<mpsc::Sender<ControlEvent>>,
    audio_tx: Option<mpsc::Sender<Bytes>>,
    /// Chunks dropped because the audio lane was full
    dropped_audio: Arc<AtomicU64>,
    connection_handle: Option<JoinHandle<()>>,
}

impl OpenAIRealtime {
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        if config.model.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "model is required".to_string(),
            ));
        }
        endpoint(&config.url, &config.model)?;
        config
            .event_names
            .validate()
            .map_err(RealtimeError::InvalidConfiguration)?;

        Ok(Self {
            config,
            http: None,
            connected: Arc::new(AtomicBool::new(false)),
            control_tx: None,
            audio_tx: None,
            dropped_audio: Arc::new(AtomicU64::new(0)),
            connection_handle: None,
        })
    }

    /// Use `client` for the credential exchange instead of building one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Number of audio chunks dropped under backpressure.
    pub fn dropped_audio_chunks(&self) -> u64 {
        self.dropped_audio.load(Ordering::Relaxed)
    }
}

/// Data channel URL: the configured endpoint with the model as a query pair.
fn endpoint(base: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid url '{base}': {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(RealtimeError::InvalidConfiguration(format!(
            "url must be ws or wss, got '{}'",
            url.scheme()
        )));
    }
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<ModelEvent>> {
        if self.connected.load(Ordering::SeqCst) {
            return Err(RealtimeError::ConnectionFailed(
                "already connected".to_string(),
            ));
        }

        let client = match &self.http {
            Some(client) => client.clone(),
            None => credential_client(CREDENTIAL_TIMEOUT)?,
        };
        let credential = acquire_credential(&client, &self.config).await?;

        let url = endpoint(&self.config.url, &self.config.model)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid url: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.token))
            .map_err(|e| RealtimeError::AuthenticationFailed(e.to_string()))?;
        request.headers_mut().insert(http::header::AUTHORIZATION, bearer);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(model = %self.config.model, ephemeral = credential.ephemeral, "Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (event_tx, event_rx) = mpsc::channel::<ModelEvent>(EVENT_CHANNEL_CAPACITY);
        let (control_tx, mut control_rx) = mpsc::channel::<ControlEvent>(CONTROL_CHANNEL_CAPACITY);
        let (audio_tx, mut audio_rx) = mpsc::channel::<Bytes>(AUDIO_CHANNEL_CAPACITY);

        let mut protocol = OpenAIProtocol::new(
            self.config.event_names.clone(),
            self.config.fatal_error_types.clone(),
        );
        let connected = self.connected.clone();
        self.connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    control = control_rx.recv() => {
                        let Some(event) = control else {
                            // Session hung up: close politely.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        };
                        let json = match protocol.encode_control(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                error!(event = event.name(), "Failed to encode control event: {}", e);
                                continue;
                            }
                        };
                        debug!(event = event.name(), "Sending control event");
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send control event: {}", e);
                            break;
                        }
                    }

                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let event = match protocol.decode(text.as_str()) {
                                    Ok(Some(event)) => event,
                                    Ok(None) => continue,
                                    Err(e) => {
                                        warn!("Dropping malformed server event: {}", e);
                                        continue;
                                    }
                                };
                                if event_tx.send(event).await.is_err() {
                                    debug!("Event receiver dropped, closing connection");
                                    let _ = ws_sink.send(Message::Close(None)).await;
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(?frame, "WebSocket closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                break;
                            }
                            None => {
                                info!("WebSocket stream ended");
                                break;
                            }
                        }
                    }

                    Some(chunk) = audio_rx.recv() => {
                        let json = match protocol.encode_audio(&chunk) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to encode audio: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send audio: {}", e);
                            break;
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            // Dropping event_tx ends the session's event stream.
        });

        self.control_tx = Some(control_tx);
        self.audio_tx = Some(audio_tx);
        self.connection_handle = Some(handle);

        Ok(event_rx)
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        // Dropping the control lane asks the task to send a close frame.
        self.control_tx = None;
        self.audio_tx = None;

        if let Some(mut handle) = self.connection_handle.take()
            && tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await.is_err()
        {
            warn!("Close handshake timed out, aborting connection task");
            handle.abort();
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Disconnected from OpenAI Realtime API");
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_audio(&mut self, audio_data: Bytes) -> RealtimeResult<()> {
        let Some(sender) = self.audio_tx.as_ref().filter(|_| self.is_ready()) else {
            return Err(RealtimeError::NotConnected);
        };

        match sender.try_send(audio_data) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped_audio.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(dropped, "Upstream audio lane full, dropping audio");
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(RealtimeError::NotConnected),
        }
    }

    async fn send_control(&mut self, event: ControlEvent) -> RealtimeResult<()> {
        let Some(sender) = self.control_tx.as_ref().filter(|_| self.is_ready()) else {
            return Err(RealtimeError::NotConnected);
        };
        sender
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}
