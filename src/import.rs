// SPDX-License-Identifier: MIT OR Apache-2.0

//! Item import from JSON dumps.
//!
//! Accepts either a single JSON array of items or a stream of item objects
//! (JSON Lines). HN API field names (`by`, `parent`, `time`) are accepted.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::embedding::{Item, SqliteStore};

/// Parses items from JSON text.
pub fn parse_items(content: &str) -> Result<Vec<Item>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).context("Failed to parse item array");
    }

    serde_json::Deserializer::from_str(content)
        .into_iter::<Item>()
        .enumerate()
        .map(|(i, item)| item.with_context(|| format!("Failed to parse item #{}", i + 1)))
        .collect()
}

/// Reads `path` and upserts every item into `store`. Returns the count.
pub fn import_file(store: &SqliteStore, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let items = parse_items(&content)?;
    let count = store.insert_items(&items)?;
    info!(path = %path.display(), count, "imported items");
    Ok(count)
}
