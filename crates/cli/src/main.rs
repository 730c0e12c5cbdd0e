//! Potager CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Start the HTTP gateway
//! - `ask`   — Ask the assistant one question from the terminal

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "potager",
    about = "Potager — assistant de jardin conversationnel",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file (default: potager.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

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

    /// Ask one question and stream the answer to the terminal
    Ask {
        /// The question, in natural language
        query: String,

        /// Also print the hidden reasoning
        #[arg(long)]
        thoughts: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(cli.config.as_deref(), port).await,
        Commands::Ask { query, thoughts } => {
            commands::ask::run(cli.config.as_deref(), &query, thoughts).await
        }
    }
}
