//! `murmur init` — write a default config file.

use anyhow::Context;
use murmur_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating {}", config_dir.display()))?;
    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!("Wrote default config to {}", config_path.display());
    println!("Edit it (or set OLLAMA_HOST / MURMUR_MODEL) and run `murmur serve`.");
    Ok(())
}
