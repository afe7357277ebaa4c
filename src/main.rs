//! Audio Convert Server
//!
//! Accepts base64-encoded m4a and ogg uploads over HTTP, converts them to MP3
//! with an external ffmpeg binary and returns the result as base64.

mod config;
mod config_file;
mod convert;
mod error;
mod http;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "audio-convert-server";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the configured level applies;
    // a load failure is reported once logging is up.
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config.toml".to_string());

    // `audio-convert-server init-config [path]` writes the defaults and exits
    if config_path == "init-config" {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        crate::config_file::generate_default_config(&path)
            .map_err(|e| ServerError::Config(format!("cannot write {}: {}", path, e)))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    let (mut config, load_error) = if std::path::Path::new(&config_path).exists() {
        match crate::config_file::ConfigFile::from_file(&config_path) {
            Ok(cf) => (cf.into_server_config(), None),
            Err(e) => (ServerConfig::default(), Some(e.to_string())),
        }
    } else {
        (ServerConfig::default(), None)
    };
    init_logging(&config);
    config.apply_env_overrides();

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = load_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    // Resolve the transcoder once; a missing binary is reported here and by
    // /health, and every conversion request fails fast until it is fixed.
    let state = Arc::new(AppState::from_config(config.clone()).await);
    match state.transcoder().binary() {
        Some(path) => tracing::info!(
            "Transcoder: {} ({})",
            path.display(),
            state.transcoder().version().unwrap_or("unknown version")
        ),
        None => tracing::warn!(
            "ffmpeg not found (checked {}, config and PATH); conversions will fail",
            crate::convert::transcoder::BINARY_ENV
        ),
    }

    let removed = state
        .converter
        .scratch
        .sweep_stale(Duration::from_secs(config.scratch.stale_after_secs))
        .await;
    if removed > 0 {
        tracing::info!("Removed {} stale scratch file(s)", removed);
    }
    tracing::info!(
        "Staging uploads in {}, output in {}",
        state.converter.scratch.upload_dir().display(),
        state.converter.scratch.output_dir().display()
    );

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("{} stopped", APP_NAME);
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "audio_convert_server={},tower_http={}",
            config.log_level, config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => tracing::warn!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
