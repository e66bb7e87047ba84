//! pagefeed CLI
//!
//! Command-line tools for feeds stored in a directory.
//!
//! # Commands
//!
//! - `push` - Append entries to the feed
//! - `allocate` - Assign positions to pending entries
//! - `page` - Print one feed page with its links
//! - `stats` - Display feed counters
//! - `replay` - Deliver entries to stdout through a named consumer
//! - `cursor` - Show or reset a consumer cursor

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// pagefeed command-line feed tools.
#[derive(Parser)]
#[command(name = "pagefeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the feed directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Entries per page
    #[arg(global = true, short = 's', long, default_value = "20")]
    page_size: usize,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append entries to the feed
    Push {
        /// Entry payloads; JSON values, anything else is taken as a string
        #[arg(required = true)]
        contents: Vec<String>,

        /// Assign positions right after pushing
        #[arg(short, long)]
        allocate: bool,
    },

    /// Assign positions to pending entries
    Allocate,

    /// Print one feed page
    Page {
        /// Page index, 0 is the newest page
        #[arg(default_value = "0")]
        index: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display feed statistics
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print entries not yet seen by a consumer, oldest first
    Replay {
        /// Consumer whose cursor tracks progress
        #[arg(short, long, default_value = "cli")]
        consumer: String,
    },

    /// Show or reset a consumer cursor
    Cursor {
        /// Consumer id
        consumer: String,

        /// Reset the cursor so the next replay starts from the oldest entry
        #[arg(short, long)]
        reset: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let page_size = cli.page_size;
    match cli.command {
        Commands::Push { contents, allocate } => {
            let path = cli.path.ok_or("Feed path required for push")?;
            commands::push::run(&path, page_size, &contents, allocate)?;
        }
        Commands::Allocate => {
            let path = cli.path.ok_or("Feed path required for allocate")?;
            commands::allocate::run(&path, page_size)?;
        }
        Commands::Page { index, format } => {
            let path = cli.path.ok_or("Feed path required for page")?;
            commands::page::run(&path, page_size, index, &format)?;
        }
        Commands::Stats { format } => {
            let path = cli.path.ok_or("Feed path required for stats")?;
            commands::stats::run(&path, page_size, &format)?;
        }
        Commands::Replay { consumer } => {
            let path = cli.path.ok_or("Feed path required for replay")?;
            commands::replay::run(&path, page_size, &consumer)?;
        }
        Commands::Cursor {
            consumer,
            reset,
            format,
        } => {
            let path = cli.path.ok_or("Feed path required for cursor")?;
            commands::cursor::run(&path, &consumer, reset, &format)?;
        }
        Commands::Version => {
            println!("pagefeed CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
