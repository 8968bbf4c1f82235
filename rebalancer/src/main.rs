//! CLI entry point for the portfolio rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use rebalanced::SearchStatus;
use rebalanced_cli::commands::{self, RunOptions};
use rebalanced_cli::config::Config;

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Multi-account portfolio rebalancer")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a snapshot and print the rebalance plan
    Run {
        /// Path to snapshot.json
        snapshot: PathBuf,

        /// Print positions as a {ticker}_{account} JSON map
        #[arg(long)]
        wire: bool,

        /// Exit with status 2 unless the search ends optimal
        #[arg(long)]
        strict: bool,
    },

    /// Validate a snapshot without solving
    Check {
        /// Path to snapshot.json
        snapshot: PathBuf,
    },

    /// List known assets
    Assets {
        /// Overlay prices from this snapshot
        snapshot: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {e}");
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let result = match cli.command {
        Command::Run {
            snapshot,
            wire,
            strict,
        } => commands::run(&config, &snapshot, &RunOptions { wire }).map(|r| {
            if strict && r.status != SearchStatus::Optimal {
                eprintln!("\nStrict mode: search ended {}", r.status);
                process::exit(2);
            }
        }),
        Command::Check { snapshot } => commands::check(&config, &snapshot).map(|_| ()),
        Command::Assets { snapshot } => commands::assets(snapshot.as_deref()).map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
