use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_api::config::Config;
use user_api::config_validator::ConfigValidator;
use user_api::server::Server;

/// In-memory user management API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Override BIND_ADDR
    #[arg(long)]
    bind_addr: Option<SocketAddr>,

    /// Override LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    ConfigValidator::validate(&config).context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("user_api={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting user API service");
    tracing::info!(
        "Configuration: bind_addr={}, api_keys={}, bypass_prefix={}",
        config.bind_addr,
        config.api_keys.split(',').filter(|k| !k.trim().is_empty()).count(),
        config.bypass_prefix
    );

    Server::new(config)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
