use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use http::{HeaderValue, Method, header};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voice_agent_bridge::config::TlsConfig;
use voice_agent_bridge::{ServerConfig, routes, state::AppState};

/// How long sessions get to run their closing path on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Connections still open this long after the sessions closed are dropped
const CONNECTION_DRAIN: Duration = Duration::from_secs(1);

/// Voice agent bridge - realtime voice sessions between callers and model endpoints
#[derive(Parser, Debug)]
#[command(name = "voice-agent-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML config file; values in it override the environment
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Reading configuration file");
            ServerConfig::from_file(&path)
        }
        None => ServerConfig::from_env(),
    };
    config.map_err(|e| anyhow!("invalid configuration: {e}"))
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(Any).allow_credentials(false),
        Some(list) => {
            let allowed: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            base.allow_origin(allowed).allow_credentials(true)
        }
        None => {
            info!("No CORS origins configured, cross-origin browser callers are refused");
            base.allow_credentials(false)
        }
    }
}

fn with_http_layers(app: Router, origins: Option<&str>) -> Router {
    let headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));
    app.layer(cors_layer(origins)).layer(headers)
}

/// Ctrl-C closes every session through its normal closing path, then
/// cancels the returned token to stop accepting connections.
fn shutdown_on_ctrl_c(state: Arc<AppState>) -> CancellationToken {
    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Could not install the Ctrl-C handler");
            return;
        }
        info!("Shutdown requested");
        state.shutdown(SHUTDOWN_GRACE).await;
        trigger.cancel();
    });
    stop
}

async fn serve_tls(
    addr: SocketAddr,
    tls: TlsConfig,
    app: Router,
    stop: CancellationToken,
) -> anyhow::Result<()> {
    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .with_context(|| {
            format!(
                "loading certificate {} with key {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })?;

    let handle = Handle::new();
    let drain = handle.clone();
    tokio::spawn(async move {
        stop.cancelled().await;
        drain.graceful_shutdown(Some(CONNECTION_DRAIN));
    });

    info!(%addr, "Bridge listening (wss)");
    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("TLS listener failed")
}

async fn serve_plain(addr: SocketAddr, app: Router, stop: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, "Bridge listening (ws)");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(stop.cancelled_owned())
    .await
    .context("listener failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env has to be applied before anything reads the environment
    let _ = dotenvy::dotenv();
    init_tracing();

    // Upstream wss and credential HTTPS both need a process-wide provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("a rustls crypto provider is already installed"))?;

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY not set, sessions will fail to connect upstream");
    }

    let address = config.address();
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("invalid listen address {address}"))?;
    let tls = config.tls.clone();
    let cors_origins = config.cors_allowed_origins.clone();

    let state = AppState::new(config).map_err(|e| anyhow!("startup failed: {e}"))?;
    let app = with_http_layers(routes::create_app(state.clone()), cors_origins.as_deref());
    let stop = shutdown_on_ctrl_c(state);

    match tls {
        Some(tls) => serve_tls(addr, tls, app, stop).await?,
        None => serve_plain(addr, app, stop).await?,
    }

    info!("Bridge stopped");
    Ok(())
}
