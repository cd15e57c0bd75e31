mod bootstrap;
mod health;
mod http_backend;
mod routes;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use permitdesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "permitdesk-server",
    about = "PermitDesk in-app support assistant server",
    after_help = "Examples:\n  permitdesk-server --config permitdesk.toml\n  permitdesk-server --port 9090 --log-level debug"
)]
struct Cli {
    #[arg(long, help = "Path to the TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Log level: trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[arg(long, help = "Address to bind the HTTP listener to")]
    bind: Option<String>,
    #[arg(long, help = "Port to bind the HTTP listener to")]
    port: Option<u16>,
}

impl Cli {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            config_path: self.config,
            require_file: false,
            overrides: ConfigOverrides {
                log_level: self.log_level,
                bind_address: self.bind,
                port: self.port,
                ..ConfigOverrides::default()
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use permitdesk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(cli.load_options())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let router = routes::router(app.orchestrator.clone());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "permitdesk-server listening"
    );

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_grace))
        .await?;

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "permitdesk-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown(grace: Duration) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        return;
    }
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining in-flight requests"
    );
}
