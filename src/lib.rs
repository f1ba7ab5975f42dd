pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use anyhow::Context;
use cli::{Cli, Commands};
pub use config::Config;
use state::SharedState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if result.is_err() {
        warn!("Tracing subscriber already installed");
    }
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command() {
        Commands::Serve => {
            config.validate()?;
            init_tracing(&config);
            run_server(config).await
        }
        Commands::InitConfig { path, force } => cli::cmd_init_config(&path, force),
        Commands::CheckConfig => cli::cmd_check_config(&config),
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Quill v{} starting...", env!("CARGO_PKG_VERSION"));

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    let sweep_interval = Duration::from_secs(config.oauth.sweep_interval_seconds.max(1));
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);

    let shared = Arc::new(SharedState::new(config).await?);
    let api_state = api::create_app_state(Arc::clone(&shared), prometheus_handle);
    let app = api::router(api_state)?;

    let sweeper_handle = {
        let relay = Arc::clone(&shared.relay);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                relay.sweep();
                metrics::gauge!("oauth_relay_entries").set(relay.store().len() as f64);
            }
        })
    };

    let prune_handle = {
        let throttle = Arc::clone(&shared.login_throttle);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(constants::intervals::THROTTLE_PRUNE);
            loop {
                ticker.tick().await;
                throttle.prune();
            }
        })
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    let result = server.await;

    sweeper_handle.abort();
    prune_handle.abort();

    if let Err(e) = &result {
        error!("Web server error: {}", e);
    }
    info!("Server stopped");

    result.map_err(Into::into)
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
