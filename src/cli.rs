// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// threadrank - Semantic search over hiring thread comments
///
/// Embeds the comments of recent hiring threads and ranks them against
/// free-text search terms, collapsing reposts by the same author.
#[derive(Parser, Debug)]
#[command(name = "threadrank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parse the `default_format` config value, ignoring unknown names.
    pub fn from_config(value: Option<&str>) -> Option<Self> {
        match value?.to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load items from a JSON array or JSON Lines file into the database
    Import {
        /// File of items (HN API field names are accepted)
        file: PathBuf,
    },

    /// Embed comments of recent threads that have no embedding yet
    Ingest {
        /// Number of recent posts per category (at most 6)
        #[arg(short, long)]
        window: Option<usize>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Rank comments against one or more search terms
    Search {
        /// Search terms; each is embedded separately
        #[arg(required = true)]
        terms: Vec<String>,

        /// Category name (hiring, seekers, a configured alias) or title pattern
        #[arg(short, long, default_value = "hiring")]
        category: String,

        /// Number of recent posts to scan (at most 6)
        #[arg(short, long)]
        window: Option<usize>,

        /// Maximum number of results to return
        #[arg(short = 'm', long)]
        limit: Option<usize>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
