// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Providers turn one text into one vector. The [`Embedder`] wrapper owns
//! the normalization decision so the rest of the crate can assume unit
//! vectors regardless of backend.

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::embedding::similarity::{is_normalized, l2_normalize};
use crate::errors::{self, Error};

/// Default embedding dimension for the dummy provider, matching all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

const DEFAULT_MAX_CHARS: usize = 8000;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier stored alongside every vector.
    fn model_id(&self) -> &str;

    /// Generates an embedding for a single text.
    ///
    /// Implementations must give up once `cancel` reports cancelled.
    fn embed(&self, cancel: &CancelToken, text: &str) -> Result<Vec<f32>>;
}

/// How an [`Embedder`] decides whether provider output needs normalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Check every vector and renormalize the ones that are not unit length.
    #[default]
    Always,
    /// The provider is known to return unit vectors; never renormalize.
    Declared,
    /// Sample the first successful vector once and apply that verdict to
    /// every later vector from the same embedder.
    Probe,
}

impl std::str::FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Normalization::Always),
            "declared" => Ok(Normalization::Declared),
            "probe" => Ok(Normalization::Probe),
            _ => Err(format!("Unknown normalization mode: {}", s)),
        }
    }
}

/// A provider plus its normalization policy.
pub struct Embedder {
    provider: Box<dyn EmbeddingProvider>,
    normalization: Normalization,
    pre_normalized: OnceCell<bool>,
}

impl Embedder {
    pub fn new(provider: Box<dyn EmbeddingProvider>, normalization: Normalization) -> Self {
        Self {
            provider,
            normalization,
            pre_normalized: OnceCell::new(),
        }
    }

    /// Builds the provider selected by configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(provider_from_config(config)?, config.normalization()))
    }

    /// Model identifier used for every stored and query vector.
    pub fn model(&self) -> &str {
        self.provider.model_id()
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Outcome of the one-time probe, once it has run.
    pub fn probed_pre_normalized(&self) -> Option<bool> {
        self.pre_normalized.get().copied()
    }

    /// Embeds `text` and returns a unit vector (zero vectors stay zero).
    pub fn embed(&self, cancel: &CancelToken, text: &str) -> errors::Result<Vec<f32>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut vector = self.provider.embed(cancel, text).map_err(Error::provider)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if vector.is_empty() {
            return Err(Error::provider(anyhow!(
                "provider {} returned an empty vector",
                self.model()
            )));
        }

        let renormalize = match self.normalization {
            Normalization::Declared => false,
            Normalization::Always => !is_normalized(&vector),
            Normalization::Probe => {
                let pre_normalized = *self.pre_normalized.get_or_init(|| {
                    let verdict = is_normalized(&vector);
                    debug!(model = self.model(), pre_normalized = verdict, "normalization probe");
                    verdict
                });
                !pre_normalized
            }
        };

        if renormalize {
            l2_normalize(&mut vector);
        }
        Ok(vector)
    }
}

/// Instantiates the provider named by `config.provider`.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider() {
        EmbeddingProviderType::Http => {
            let api_key = match config.api_key_env() {
                Some(var) => std::env::var(var).ok().filter(|key| !key.trim().is_empty()),
                None => None,
            };
            Ok(Box::new(HttpProvider::new(
                config.endpoint(),
                config.model(),
                api_key,
                Duration::from_secs(config.timeout_secs()),
            )?))
        }
        EmbeddingProviderType::Command => Ok(Box::new(CommandProvider::new(
            config.command().to_string(),
            config.model().to_string(),
        ))),
        EmbeddingProviderType::Builtin => builtin_provider(config),
        EmbeddingProviderType::Dummy => {
            let provider = DummyProvider::new(config.dimension());
            Ok(Box::new(match config.model.as_deref() {
                Some(model) => provider.with_model(model),
                None => provider,
            }))
        }
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn builtin_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    Ok(Box::new(FastEmbedder::new(config.max_chars())?))
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn builtin_provider(_config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    bail!("The builtin embedding provider is not available on this platform")
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Provider for OpenAI-compatible `/embeddings` endpoints.
pub struct HttpProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
        })
    }
}

impl EmbeddingProvider for HttpProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, cancel: &CancelToken, text: &str) -> Result<Vec<f32>> {
        if cancel.is_cancelled() {
            bail!("Embedding request cancelled");
        }
        let timeout = cancel
            .remaining()
            .map_or(self.timeout, |left| left.min(self.timeout));

        let payload = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .timeout(timeout)
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .with_context(|| format!("Failed to send embedding request to {}", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("Embedding API returned {}: {}", status, body.trim());
        }

        let parsed: EmbeddingResponse = response
            .json()
            .context("Failed to decode embedding response")?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| anyhow!("No embeddings found in the response"))
    }
}

/// Command provider that shells out to an external process.
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    fn run_command(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.to_string().as_bytes())
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim())
            .with_context(|| "Failed to parse embeddings command output as JSON")?;
        parse_command_output(parsed)
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, cancel: &CancelToken, text: &str) -> Result<Vec<f32>> {
        if cancel.is_cancelled() {
            bail!("Embedding command cancelled");
        }
        self.run_command(&[text])?
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned"))
    }
}

fn parse_command_output(parsed: Value) -> Result<Vec<Vec<f32>>> {
    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(ref obj) => {
            if let Some(value) = obj.get("embeddings") {
                value.clone()
            } else if let Some(value) = obj.get("vectors") {
                value.clone()
            } else if let Some(value) = obj.get("data") {
                value.clone()
            } else {
                bail!("Embeddings command output missing 'embeddings' field");
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect()
}

/// Local fastembed provider using sentence-transformers/all-MiniLM-L6-v2.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: std::sync::Mutex<fastembed::TextEmbedding>,
    model_id: String,
    max_chars: usize,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new(max_chars: usize) -> Result<Self> {
        let model = fastembed::EmbeddingModel::AllMiniLML6V2;
        let model_id = model.to_string();
        let init = fastembed::InitOptions::new(model);
        let embedder = fastembed::TextEmbedding::try_new(init)
            .context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder: std::sync::Mutex::new(embedder),
            model_id,
            max_chars: if max_chars == 0 {
                DEFAULT_MAX_CHARS
            } else {
                max_chars
            },
        })
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, cancel: &CancelToken, text: &str) -> Result<Vec<f32>> {
        if cancel.is_cancelled() {
            bail!("Embedding cancelled");
        }
        let prepared = truncate_to_chars(text, self.max_chars);
        let mut embedder = self
            .embedder
            .lock()
            .map_err(|e| anyhow!("Failed to acquire model lock: {}", e))?;
        embedder
            .embed(vec![prepared.into_owned()], None)?
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned"))
    }
}

/// Deterministic offline provider.
///
/// Hashes lowercase word tokens into a fixed number of buckets, so texts
/// sharing words get similar vectors. Useful for tests and dry runs.
pub struct DummyProvider {
    model: String,
    dimension: usize,
}

impl DummyProvider {
    /// Creates a new dummy provider with specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "dummy".to_string(),
            dimension: dimension.max(1),
        }
    }

    /// Stores vectors under `model` instead of `dummy`.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

impl EmbeddingProvider for DummyProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, _cancel: &CancelToken, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            vector[bucket] += sign;
        }
        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    let mut count = 0;
    for (idx, _) in input.char_indices() {
        if count == max_chars {
            return Cow::Owned(input[..idx].to_string());
        }
        count += 1;
    }

    Cow::Borrowed(input)
}
