//! Suite Gateway entry point
//!
//! Reads configuration from `$SUITE_GATEWAY_CONFIG` (default `gateway.toml`)
//! plus `HOST`/`PORT`, then serves the chat API.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use suite_gateway::{server, AppState, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting Suite gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::load_from_env()
        .inspect_err(|e| {
            if e.is_config_file_problem() {
                tracing::error!(
                    env = suite_gateway::config::CONFIG_PATH_ENV,
                    "Fix the gateway config file named by this variable (default gateway.toml)"
                );
            }
        })
        .context("failed to load gateway configuration")?;
    let state = AppState::from_config(config).context("failed to initialize gateway state")?;

    server::serve(state).await.context("gateway server stopped")?;
    Ok(())
}
