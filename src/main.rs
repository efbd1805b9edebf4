// SPDX-License-Identifier: MIT OR Apache-2.0

//! threadrank - Semantic search over hiring thread comments
//!
//! Ingests embeddings for the comments of recent "Ask HN" hiring threads
//! into SQLite and ranks them against free-text search terms.

mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, OutputFormat};
use threadrank::config::Config;
use threadrank::embedding::{Embedder, SqliteStore};
use threadrank::ingest::{IngestOptions, IngestionPipeline};
use threadrank::output::{print_json, render_ingest_stats, render_results, use_colors};
use threadrank::search::{SearchOptions, SearchRequest, VectorSearch};
use threadrank::CancelToken;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with THREADRANK_LOG env var (e.g., THREADRANK_LOG=debug threadrank ingest)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("THREADRANK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let format = cli
        .format
        .or_else(|| OutputFormat::from_config(config.default_format.as_deref()))
        .unwrap_or(OutputFormat::Text);
    let use_color = use_colors() && format == OutputFormat::Text;

    match cli.command {
        Commands::Import { file } => {
            let store = open_store(&config)?;
            let count = threadrank::import::import_file(&store, &file)?;
            match format {
                OutputFormat::Json => {
                    print_json(&serde_json::json!({ "imported": count }), cli.compact)?
                }
                OutputFormat::Text => println!("Imported {} items from {}", count, file.display()),
            }
        }
        Commands::Ingest { window, progress } => {
            let store = open_store(&config)?;
            let embedder = Embedder::from_config(config.embeddings())
                .context("Failed to initialize embedding provider")?;
            let options = IngestOptions {
                categories: config.ingest().categories(),
                concurrency: config.embeddings().concurrency(),
                progress: progress && format == OutputFormat::Text,
            };
            let window = window.unwrap_or_else(|| config.ingest().window());

            let stats = IngestionPipeline::new(&store, &embedder, options)
                .run(&CancelToken::new(), window)
                .context("Ingestion failed")?;

            match format {
                OutputFormat::Json => print_json(&stats, cli.compact)?,
                OutputFormat::Text => {
                    print!("{}", render_ingest_stats(&stats, embedder.model(), use_color))
                }
            }
        }
        Commands::Search {
            terms,
            category,
            window,
            limit,
        } => {
            let store = open_store(&config)?;
            let embedder = Embedder::from_config(config.embeddings())
                .context("Failed to initialize embedding provider")?;
            let options = SearchOptions {
                concurrency: config.search().concurrency(),
                duplicate_threshold: config.search().duplicate_threshold(),
            };
            let request = SearchRequest {
                window: window.unwrap_or_else(|| config.search().window()),
                category: config.category_pattern(&category),
                terms,
                limit: limit.unwrap_or_else(|| config.search().limit()),
            };

            let results = VectorSearch::new(&store, &embedder, options)
                .search(&CancelToken::new(), &request)
                .context("Search failed")?;

            match format {
                OutputFormat::Json => print_json(&results, cli.compact)?,
                OutputFormat::Text => {
                    print!("{}", render_results(&results, &request.terms, use_color))
                }
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "threadrank", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = config.storage().path();
    SqliteStore::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}
