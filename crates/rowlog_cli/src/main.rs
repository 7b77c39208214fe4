//! rowlog CLI
//!
//! Command-line tools for working with rowlog journal files.
//!
//! # Commands
//!
//! - `inspect` - Display journal statistics
//! - `export` - Dump pending oplog entries
//! - `prune` - Mark entries up to a sequence as acknowledged
//! - `compact` - Rewrite the journal, dropping pruned entries

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// rowlog command-line journal tools.
#[derive(Parser)]
#[command(name = "rowlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal file
    #[arg(global = true, short, long)]
    journal: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display journal statistics
    Inspect {
        /// Show per-table breakdown
        #[arg(short, long)]
        tables: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump pending oplog entries
    Export {
        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (jsonl, json)
        #[arg(short, long, default_value = "jsonl")]
        format: String,
    },

    /// Mark entries up to a sequence as acknowledged
    Prune {
        /// Highest sequence number to prune
        #[arg(short, long)]
        up_to: u64,
    },

    /// Rewrite the journal, dropping pruned entries
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { tables, format } => {
            let journal = cli.journal.ok_or("Journal path required for inspect")?;
            commands::inspect::run(&journal, tables, &format)?;
        }
        Commands::Export { limit, format } => {
            let journal = cli.journal.ok_or("Journal path required for export")?;
            commands::export::run(&journal, limit, &format)?;
        }
        Commands::Prune { up_to } => {
            let journal = cli.journal.ok_or("Journal path required for prune")?;
            commands::prune::run(&journal, up_to)?;
        }
        Commands::Compact { dry_run } => {
            let journal = cli.journal.ok_or("Journal path required for compact")?;
            commands::compact::run(&journal, dry_run)?;
        }
        Commands::Version => {
            println!("rowlog CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
