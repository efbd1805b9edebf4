// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector search over stored comment embeddings.
//!
//! A search embeds each term, scores every comment under the recent posts of
//! a category into a shared bounded heap, drops repeat items and same-author
//! near duplicates, then returns the best `limit` survivors.

pub mod dedup;
pub mod heap;
pub mod ranker;

use serde::Serialize;

use crate::embedding::Item;

pub use dedup::{dedupe_items, suppress_same_author, DEFAULT_DUPLICATE_THRESHOLD};
pub use heap::TopNHeap;
pub use ranker::{SearchOptions, SearchRequest, VectorSearch};

/// One scored comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub item_id: i64,
    /// Query term that produced this score
    pub term: String,
    /// Dot product of unit vectors, in [-1, 1]
    pub similarity: f32,
    /// Filled in after ranking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

impl SearchResult {
    pub fn scored(item_id: i64, term: &str, similarity: f32) -> Self {
        Self {
            item_id,
            term: term.to_string(),
            similarity,
            item: None,
        }
    }
}

/// Stable sort by descending similarity, then keep the first `limit`.
pub fn assemble(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(limit);
    results
}
