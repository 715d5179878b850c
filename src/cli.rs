//! CLI interface for the gateway

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "lifelog-gateway")]
#[command(about = "Unified life-journaling gateway with a self-improvement pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default when no command is given)
    Serve {
        /// Override the listen host
        #[arg(long)]
        host: Option<String>,
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the self-improvement evaluation and exit
    Improve,
    /// Capture a backup snapshot and print its path
    Backup,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        None => crate::server::start(config).await,
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            crate::server::start(config).await
        }
        Some(Commands::Improve) => {
            let state = crate::server::ServerState::build(config).await?;
            let llm_key_present = state.chat.llm().key_present();
            let metrics =
                crate::evolve::build_metrics(&state.store, &state.mesh, llm_key_present).await;
            let dashboard = crate::evolve::build_dashboard(&state.store, &state.mesh).await;
            let evaluation = crate::evolve::evaluator::evaluate(&metrics, &dashboard, llm_key_present);
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
            Ok(())
        }
        Some(Commands::Backup) => {
            let root = std::env::current_dir()?;
            let path = crate::evolve::backup::create_snapshot(
                &root,
                &config.backup_dir(),
                &config.backup.paths,
            )
            .await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
