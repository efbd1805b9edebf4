// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for threadrank
//!
//! Loads configuration from .threadrankrc.toml in current directory or
//! ~/.config/threadrank/config.toml

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::embedding::Normalization;

/// Largest recency window honoured by ingestion and search.
pub const MAX_WINDOW: usize = 6;

/// Title pattern for "Who is hiring?" threads.
pub const WHO_IS_HIRING: &str = "Ask HN: Who is hiring?%";

/// Title pattern for "Who wants to be hired?" threads.
pub const WHO_WANTS_TO_BE_HIRED: &str = "Ask HN: Who wants to be hired?%";

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible HTTP endpoint
    #[default]
    Http,
    Command,
    Builtin,
    Dummy,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Get database path (defaults to .threadrank/threadrank.sqlite)
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(".threadrank").join("threadrank.sqlite"))
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (http, command, builtin, dummy)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier, also the key embeddings are stored under
    pub model: Option<String>,
    /// Base URL of the HTTP provider
    pub endpoint: Option<String>,
    /// Environment variable holding the HTTP provider's API key
    pub api_key_env: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Normalization policy (always, declared, probe)
    pub normalization: Option<Normalization>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Character budget for the builtin provider
    pub max_chars: Option<usize>,
    /// Vector dimension for the dummy provider
    pub dimension: Option<usize>,
    /// Simultaneous embedding calls during ingestion
    pub concurrency: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Http)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "text-embedding-3-small")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("text-embedding-3-small")
    }

    /// Get endpoint (defaults to the OpenAI API)
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or("https://api.openai.com/v1")
    }

    /// Get API key variable (defaults to OPENAI_API_KEY; empty disables auth)
    pub fn api_key_env(&self) -> Option<&str> {
        match self.api_key_env.as_deref() {
            Some("") => None,
            Some(var) => Some(var),
            None => Some("OPENAI_API_KEY"),
        }
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get normalization policy (defaults to Always)
    pub fn normalization(&self) -> Normalization {
        self.normalization.unwrap_or_default()
    }

    /// Get timeout (defaults to 60 seconds)
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(60)
    }

    /// Get max chars (defaults to 8000)
    pub fn max_chars(&self) -> usize {
        self.max_chars.unwrap_or(8000)
    }

    /// Get dummy dimension (defaults to 384)
    pub fn dimension(&self) -> usize {
        self.dimension
            .unwrap_or(crate::embedding::DEFAULT_EMBEDDING_DIM)
    }

    /// Get ingestion concurrency (defaults to 10)
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(10).max(1)
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of recent posts to search
    pub window: Option<usize>,
    /// Maximum results to return
    pub limit: Option<usize>,
    /// Posts scored in parallel
    pub concurrency: Option<usize>,
    /// Same-author similarity above which the lower-ranked item is dropped
    pub duplicate_threshold: Option<f32>,
}

impl SearchConfig {
    /// Get window (defaults to 3)
    pub fn window(&self) -> usize {
        self.window.unwrap_or(3)
    }

    /// Get limit (defaults to 10)
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(10)
    }

    /// Get concurrency (defaults to 5)
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(5).max(1)
    }

    /// Get duplicate threshold (defaults to 0.9)
    pub fn duplicate_threshold(&self) -> f32 {
        self.duplicate_threshold.unwrap_or(0.9)
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of recent posts per category to embed
    pub window: Option<usize>,
    /// Title patterns (SQL LIKE) of the threads to embed
    pub categories: Option<Vec<String>>,
}

impl IngestConfig {
    /// Get window (defaults to MAX_WINDOW)
    pub fn window(&self) -> usize {
        self.window.unwrap_or(MAX_WINDOW)
    }

    /// Get categories (defaults to both hiring threads)
    pub fn categories(&self) -> Vec<String> {
        self.categories.clone().unwrap_or_else(|| {
            vec![WHO_IS_HIRING.to_string(), WHO_WANTS_TO_BE_HIRED.to_string()]
        })
    }
}

/// Configuration loaded from .threadrankrc.toml or ~/.config/threadrank/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format (text or json)
    pub default_format: Option<String>,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Named title patterns, e.g. `hiring = "Ask HN: Who is hiring?%"`
    #[serde(default)]
    pub categories: HashMap<String, String>,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .threadrankrc.toml in current directory
    /// 2. ~/.config/threadrank/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".threadrankrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("threadrank").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load configuration from an explicit path, if it exists and parses.
    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Resolve a category name to a title pattern.
    ///
    /// Configured names win over the built-in `hiring` and `seekers`;
    /// anything else is taken as a literal pattern.
    pub fn category_pattern(&self, name: &str) -> String {
        if let Some(pattern) = self.categories.get(name) {
            return pattern.clone();
        }
        match name {
            "hiring" => WHO_IS_HIRING.to_string(),
            "seekers" => WHO_WANTS_TO_BE_HIRED.to_string(),
            other => other.to_string(),
        }
    }

    /// Get the storage configuration
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    /// Get the ingestion configuration
    pub fn ingest(&self) -> &IngestConfig {
        &self.ingest
    }
}
