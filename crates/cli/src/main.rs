//! QoS Ensurance CLI
//!
//! A command-line tool for inspecting objective state, component
//! health and configured avoidance actions on a node's QoS agent.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{actions, health, status};

/// QoS Ensurance CLI
#[derive(Parser)]
#[command(name = "qosctl")]
#[command(author, version, about = "CLI for the QoS ensurance agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via QOSCTL_API_URL env var)
    #[arg(long, env = "QOSCTL_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show per-objective engine state
    Status,

    /// Show agent component health
    Health,

    /// List configured avoidance actions
    Actions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Status => status::show_status(&client, cli.format).await?,
        Commands::Health => health::show_health(&client, cli.format).await?,
        Commands::Actions => actions::show_actions(&client, cli.format).await?,
    }

    Ok(())
}
