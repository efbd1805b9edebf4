// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result de-duplication.
//!
//! Two passes over a ranked list: repeat item ids surfaced by several terms
//! are dropped, then near-identical submissions by the same author are
//! collapsed to the higher-ranked one.

use std::collections::{HashMap, HashSet};

use super::SearchResult;
use crate::embedding::similarity::dot;
use crate::embedding::{EmbeddingStore, Item};
use crate::errors::Result;

/// Same-author similarity above which the lower-ranked item is dropped.
pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.9;

/// Keeps the first occurrence of each item id, preserving order.
pub fn dedupe_items(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::with_capacity(results.len());
    results
        .into_iter()
        .filter(|result| seen.insert(result.item_id))
        .collect()
}

/// Drops same-author near duplicates and attaches each survivor's item.
///
/// Within one author's results, taken in ranked order, every kept item is
/// compared with every later kept item and the later one is dropped when
/// their similarity exceeds `threshold`. Greedy and order dependent.
/// Results whose item is gone from the store are dropped; a result whose
/// vector is missing is kept without comparison.
pub fn suppress_same_author(
    store: &dyn EmbeddingStore,
    model: &str,
    results: Vec<SearchResult>,
    threshold: f32,
) -> Result<Vec<SearchResult>> {
    if results.is_empty() {
        return Ok(results);
    }

    let ids: Vec<i64> = results.iter().map(|r| r.item_id).collect();
    let vectors: HashMap<i64, Vec<f32>> = store
        .embeddings_by_ids(model, &ids)?
        .into_iter()
        .map(|record| (record.item_id, record.vector))
        .collect();
    let mut items: HashMap<i64, Item> = store
        .items_by_ids(&ids)?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();

    // Positions into `results`, grouped by author in ranked order.
    let mut by_author: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, result) in results.iter().enumerate() {
        if let Some(item) = items.get(&result.item_id) {
            by_author.entry(item.author.as_str()).or_default().push(pos);
        }
    }

    let mut dropped = vec![false; results.len()];
    for positions in by_author.values().filter(|p| p.len() > 1) {
        for (i, &keep) in positions.iter().enumerate() {
            if dropped[keep] {
                continue;
            }
            let Some(kept_vector) = vectors.get(&results[keep].item_id) else {
                continue;
            };
            for &later in &positions[i + 1..] {
                if dropped[later] {
                    continue;
                }
                let Some(later_vector) = vectors.get(&results[later].item_id) else {
                    continue;
                };
                if dot(kept_vector, later_vector)? > threshold {
                    dropped[later] = true;
                }
            }
        }
    }

    Ok(results
        .into_iter()
        .zip(dropped)
        .filter(|(_, dropped)| !dropped)
        .filter_map(|(mut result, _)| {
            result.item = Some(items.remove(&result.item_id)?);
            Some(result)
        })
        .collect())
}
