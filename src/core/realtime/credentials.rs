//! Upstream credential acquisition.
//!
//! The data channel is opened either with the long-lived API key or with a
//! short-lived client secret minted by the provider's session endpoint. The
//! same exchange backs the token endpoint handed to browser clients.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroize;

use super::base::{RealtimeConfig, RealtimeError, RealtimeResult};

/// How the bearer for the data channel is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Use the configured API key directly
    #[default]
    StaticApiKey,
    /// Exchange the API key for an ephemeral client secret first
    EphemeralToken,
}

/// A bearer credential for the upstream data channel.
#[derive(Clone, Serialize)]
pub struct UpstreamCredential {
    /// Bearer token value
    pub token: String,
    /// Unix timestamp after which the token is useless
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Whether this is a short-lived client secret
    pub ephemeral: bool,
}

impl std::fmt::Debug for UpstreamCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

impl Drop for UpstreamCredential {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

#[derive(Debug, Serialize)]
struct EphemeralSessionRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EphemeralSessionResponse {
    client_secret: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Obtain the bearer for the data channel according to `config.credential_mode`.
pub async fn acquire_credential(
    client: &Client,
    config: &RealtimeConfig,
) -> RealtimeResult<UpstreamCredential> {
    if config.api_key.is_empty() {
        return Err(RealtimeError::AuthenticationFailed(
            "API key is required".to_string(),
        ));
    }

    match config.credential_mode {
        CredentialMode::StaticApiKey => Ok(UpstreamCredential {
            token: config.api_key.clone(),
            expires_at: None,
            ephemeral: false,
        }),
        CredentialMode::EphemeralToken => request_ephemeral_token(client, config).await,
    }
}

/// Mint a short-lived client secret from the provider's session endpoint.
pub async fn request_ephemeral_token(
    client: &Client,
    config: &RealtimeConfig,
) -> RealtimeResult<UpstreamCredential> {
    let url = config
        .credential_url
        .as_deref()
        .unwrap_or(super::openai::OPENAI_REALTIME_SESSIONS_URL);

    debug!(url, model = %config.model, "Requesting ephemeral upstream credential");

    let response = client
        .post(url)
        .bearer_auth(&config.api_key)
        .json(&EphemeralSessionRequest {
            model: &config.model,
            voice: config.session.voice.as_deref(),
        })
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                RealtimeError::Timeout(format!("credential exchange: {e}"))
            } else {
                RealtimeError::AuthenticationFailed(format!("credential request failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RealtimeError::AuthenticationFailed(format!(
            "credential endpoint returned {status}"
        )));
    }

    let body: EphemeralSessionResponse = response.json().await.map_err(|e| {
        RealtimeError::AuthenticationFailed(format!("invalid credential response: {e}"))
    })?;

    info!("Obtained ephemeral upstream credential");
    Ok(UpstreamCredential {
        token: body.client_secret.value,
        expires_at: body.client_secret.expires_at,
        ephemeral: true,
    })
}

/// Build the HTTP client used for credential exchange.
pub fn credential_client(timeout: Duration) -> RealtimeResult<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Failed to create HTTP client: {e}")))
}
