use anyhow::Context;
use clap::Parser;
use dashboard::client::{Upstream, UpstreamClient};
use dashboard::config::Config;
use dashboard::metrics;
use dashboard::render::HtmlRenderer;
use dashboard::routes::{create_router, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dashboard=info")),
        )
        .init();

    info!("Starting IoT dashboard");
    info!("HTTP server: {}", config.http_addr);
    info!("Device management: {}", config.dev_mgmt_url);
    info!("Things: {}", config.things_url);
    info!("Measurements: {}", config.measurements_url);
    if config.devmode {
        warn!("Devmode enabled, login is bypassed");
    }

    // Initialize metrics
    metrics::init_metrics();

    if let Err(e) = run(config).await {
        error!("Dashboard failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Shutting down");
}

async fn run(config: Config) -> anyhow::Result<()> {
    let client = UpstreamClient::new(config.upstream_timeout())
        .context("failed to build upstream client")?;
    let state = AppState::new(Upstream::new(client, config.upstreams()), HtmlRenderer);
    let app = create_router(state.clone(), config.devmode, &config.asset_path);

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {} (version {})", config.http_addr, state.version);

    // Open event streams say goodbye before the server drains them.
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal");
        state.shut_down();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    Ok(())
}
