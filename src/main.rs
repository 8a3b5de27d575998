use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bangs::analytics::{AnalyticsRecorder, StatsAggregator, UsageLogger};
use bangs::commands::{CommandConfig, Registry, TemplateExecutor};
use bangs::config::Config;
use bangs::resolver::Resolver;
use bangs::{api, redirect};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let command_config = match CommandConfig::load(&config.commands_file) {
        Ok(command_config) => command_config,
        Err(err) => {
            if !config.commands_file.exists() {
                error!(
                    "Configuration file '{}' not found. Copy 'commands.json.sample' to '{}' and customize it.",
                    config.commands_file.display(),
                    config.commands_file.display()
                );
            }
            return Err(err);
        }
    };

    let registry = Arc::new(Registry::new(command_config));
    info!(
        "Loaded {} commands from {}",
        registry.len(),
        config.commands_file.display()
    );
    match registry.default_command() {
        Some(cmd) => info!("Default command: {}", cmd.name),
        None => info!("No default command configured, unknown queries go to the fallback search"),
    }
    for problem in registry.validate_templates(&TemplateExecutor::new()) {
        warn!("Broken URL template, requests using it will fail: {}", problem);
    }

    // Initialize analytics
    let logger = Arc::new(UsageLogger::new(&config.analytics.log_file));
    let recorder = Arc::new(AnalyticsRecorder::new(
        Arc::clone(&logger),
        config.analytics.buffer_size,
    ));
    let aggregator = Arc::new(StatsAggregator::new(Arc::clone(&logger)));
    info!("Recording usage to {}", config.analytics.log_file.display());

    // Create routers
    let resolver = Resolver::new(registry, recorder.clone());
    let app = redirect::create_redirect_router(resolver, config.proxy.clone())
        .merge(api::create_api_router(aggregator, config.dashboard.clone()));

    if let Some(ref static_dir) = config.dashboard.static_dir {
        info!("🎨 Serving dashboard from directory: {}", static_dir);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Listening on http://{}", addr);
    info!("   - Search with http://{}/?q=%s", addr);
    info!("   - Dashboard at http://{}/dashboard", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    recorder.shutdown().await;
    info!("Usage log flushed, bye");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
