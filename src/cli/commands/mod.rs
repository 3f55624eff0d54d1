//! CLI parser and command dispatch.

mod analyze;
mod fetch;
mod init;
mod publish;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, CONFIG_FILE_NAME};

#[derive(Parser)]
#[command(name = "fees")]
#[command(about = "Fee document acquisition and analysis system")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ./feeacquire.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration and create the data directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Retrieve configured entity documents (conditional fetch)
    Fetch,

    /// Extract text and classify documents
    Analyze {
        /// Also compute page embeddings
        #[arg(long)]
        embed: bool,
        /// Skip classification (extraction only)
        #[arg(long)]
        no_classify: bool,
        /// Number of worker tasks (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Publish analysis records to the search index
    Publish {
        /// Publish text-only documents, without embeddings
        #[arg(long)]
        skip_embeddings: bool,
    },

    /// Show corpus status
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    match cli.command {
        Commands::Init { force } => init::cmd_init(&config_path, cli.data_dir.as_deref(), force),
        command => {
            let mut config = Config::load(&config_path)?;
            if let Some(dir) = cli.data_dir {
                config.data_dir = dir;
            }
            match command {
                Commands::Fetch => fetch::cmd_fetch(&config).await,
                Commands::Analyze {
                    embed,
                    no_classify,
                    workers,
                } => analyze::cmd_analyze(&config, !no_classify, embed, workers).await,
                Commands::Publish { skip_embeddings } => {
                    publish::cmd_publish(&config, skip_embeddings).await
                }
                Commands::Status => status::cmd_status(&config),
                Commands::Init { .. } => unreachable!(),
            }
        }
    }
}
