//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Contraction tracker.
///
/// Records contractions with a single toggle and reports how long and how far
/// apart they are.
#[derive(Debug, Parser)]
#[command(name = "ct", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a contraction, or stop the one in progress.
    Toggle {
        /// When it happened: ISO 8601 or relative (e.g., '30 seconds ago').
        #[arg(long)]
        at: Option<String>,
    },

    /// Show tracking state and contraction statistics.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List recorded contractions and breaks.
    History {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete all recorded intervals and any contraction in progress.
    Reset {
        /// Confirm the reset. History cannot be recovered.
        #[arg(long)]
        yes: bool,
    },

    /// Remove stored break intervals, keeping contractions only.
    Migrate,

    /// Replace history with a sample series of contractions ending now.
    Seed,
}
