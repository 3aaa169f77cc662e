use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rx_refill_core::RefillCore;
use rx_refill_server::config::DEFAULT_LOG_FILTER;
use rx_refill_server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let core = RefillCore::open(&config.database_path).with_context(|| {
        format!("failed to open database at {}", config.database_path.display())
    })?;

    let server = rx_refill_server::start(&config, core)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    server.shutdown().await.context("server terminated abnormally")?;
    Ok(())
}
