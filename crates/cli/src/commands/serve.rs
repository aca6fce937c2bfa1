//! `murmur serve` — start the HTTP gateway.

use anyhow::Context;
use murmur_config::AppConfig;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("loading configuration")?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    tracing::info!(
        provider = %config.backend.provider,
        model = %config.backend.model,
        db = %config.storage.path,
        "Starting murmur"
    );

    murmur_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("gateway failed: {e}"))
}
