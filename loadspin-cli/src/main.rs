// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Loadspin CLI
//!
//! Command-line interface for the loadspin load generator.

use clap::{Parser, Subcommand};

mod api;
mod commands;
mod metrics;
mod tui;

/// Loadspin - synthetic transactional load with a live satisfaction score
#[derive(Parser)]
#[command(name = "loadspin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "loadspin.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the controller, its scaling source and the HTTP API
    Run,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// Send a scenario to one or more running instances
    Send {
        /// Scenario tag, e.g. scale-up-eu
        scenario: String,

        /// Base URL of an instance; repeat for several
        #[arg(short, long = "endpoint", required = true)]
        endpoints: Vec<String>,
    },

    /// Live dashboard for a running instance
    Watch {
        /// Base URL of the instance
        #[arg(short, long, default_value = "http://127.0.0.1:3000")]
        url: String,

        /// Refresh interval in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Run => commands::run::execute(&cli.config).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
        Commands::Send {
            scenario,
            endpoints,
        } => commands::send::execute(&scenario, &endpoints).await,
        Commands::Watch { url, interval_ms } => commands::watch::execute(&url, interval_ms).await,
    }
}
