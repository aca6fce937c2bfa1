//! `murmur doctor` — diagnose config, store, and backend health.

use anyhow::Context;
use murmur_config::AppConfig;
use murmur_core::backend::CompletionBackend;
use murmur_core::log::MessageLog;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    println!("Config:");
    println!("  provider:  {}", config.backend.provider);
    println!("  model:     {}", config.backend.model);
    println!("  database:  {}", config.storage.path);
    println!(
        "  context:   {} min window, {} summaries",
        config.context.recent_window_minutes, config.context.summary_limit
    );

    print!("Store:     ");
    match murmur_store::SqliteStore::new(&config.storage.path).await {
        Ok(store) => {
            let count = store.count().await.context("counting records")?;
            println!("ok ({count} records)");
        }
        Err(e) => println!("FAILED — {e}"),
    }

    print!("Backend:   ");
    let backend = murmur_providers::build_from_config(&config).context("building backend")?;
    match backend.health_check().await {
        Ok(true) => println!("ok ({})", backend.name()),
        Ok(false) => println!("unhealthy ({})", backend.name()),
        Err(e) => println!("FAILED — {e}"),
    }

    Ok(())
}
