use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use api_edge::config::{self, Config};
use api_edge::handlers::AppState;
use api_edge::server::{build_app, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let (config, source) = load_config()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting api-edge v{}", env!("CARGO_PKG_VERSION"));
    match source {
        Some(path) => info!("Loaded configuration from {}", path),
        None => info!("No config file found, using default configuration"),
    }

    if config.rewrite.enabled {
        info!(
            prefix = %config.rewrite.prefix,
            fallback_path = %config.rewrite.fallback_path,
            "Prefix rewrite enabled"
        );
    } else {
        info!("Prefix rewrite disabled, requests pass through unchanged");
    }

    let addr: SocketAddr = config.server_addr().parse()?;
    let state = Arc::new(AppState::from_config(config)?);
    let app = build_app(state);

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Returns the config and the file it came from, if any
fn load_config() -> anyhow::Result<(Config, Option<String>)> {
    let config_path =
        std::env::var("EDGE_CONFIG").unwrap_or_else(|_| "config/edge.toml".to_string());

    if std::path::Path::new(&config_path).exists() {
        let config = Config::load(&config_path)?;
        Ok((config, Some(config_path)))
    } else {
        Ok((Config::default(), None))
    }
}

fn init_logging(config: &config::LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
