//! `counsel serve` — start the HTTP API server.

use anyhow::Result;
use tracing::info;

use counsel_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        backend = %config.llm.backend,
        model = %config.llm.model,
        database = %config.database.url,
        "Starting Counsel"
    );

    counsel_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}
