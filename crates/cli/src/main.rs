//! Murmur CLI — the main entry point.
//!
//! `serve` runs the gateway, `init` writes a starter config, `doctor`
//! checks config, store, and backend health.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "murmur",
    about = "Murmur — message aggregator with a local LLM brain",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a default config file to ~/.murmur/config.toml
    Init,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Init => commands::init::run()?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

/// RUST_LOG wins when set; otherwise `-v` flips the default level to debug.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .with_target(false)
        .init();
}
