// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-term vector search.

use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info};

use super::dedup::{dedupe_items, suppress_same_author, DEFAULT_DUPLICATE_THRESHOLD};
use super::heap::TopNHeap;
use super::{assemble, SearchResult};
use crate::cancel::CancelToken;
use crate::config::MAX_WINDOW;
use crate::embedding::similarity::dot;
use crate::embedding::{Embedder, EmbeddingStore};
use crate::errors::{Error, Result};
use crate::workers::try_for_each_bounded;

/// Search tuning.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Posts scanned simultaneously
    pub concurrency: usize,
    /// Same-author similarity above which a result is dropped
    pub duplicate_threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }
}

/// What to look for and where.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Number of recent posts to scan, clamped to [`MAX_WINDOW`]
    pub window: usize,
    /// Title pattern of the threads to scan
    pub category: String,
    pub terms: Vec<String>,
    /// Maximum results returned
    pub limit: usize,
}

pub struct VectorSearch<'a> {
    store: &'a dyn EmbeddingStore,
    embedder: &'a Embedder,
    options: SearchOptions,
}

impl<'a> VectorSearch<'a> {
    pub fn new(
        store: &'a dyn EmbeddingStore,
        embedder: &'a Embedder,
        options: SearchOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            options,
        }
    }

    /// Returns at most `request.limit` comments ranked by similarity to any
    /// of the terms, with repeat items and same-author near duplicates removed.
    ///
    /// Scores are only computed against vectors stored for the embedder's
    /// model. Any term or scan failure aborts the whole search.
    pub fn search(
        &self,
        cancel: &CancelToken,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>> {
        if request.terms.is_empty() || request.limit == 0 {
            return Ok(Vec::new());
        }

        let model = self.embedder.model();
        let window = request.window.min(MAX_WINDOW);
        let posts = self.store.items_by_category(&request.category, window)?;
        debug!(category = %request.category, posts = posts.len(), "scanning posts");

        let mut queries = Vec::with_capacity(request.terms.len());
        for term in &request.terms {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            queries.push((term.as_str(), self.embedder.embed(cancel, term)?));
        }

        let started = Instant::now();
        let capacity = request.limit.saturating_mul(request.terms.len());
        let heap = Mutex::new(TopNHeap::new(capacity));
        let post_ids: Vec<i64> = posts.iter().map(|post| post.id).collect();

        try_for_each_bounded(self.options.concurrency, cancel, post_ids, |post_id| {
            let records = self.store.embeddings_by_parent(model, post_id)?;
            for record in &records {
                for (term, query) in &queries {
                    let similarity = dot(query, &record.vector)?;
                    heap.lock()
                        .map_err(|_| Error::store("result heap lock poisoned"))?
                        .push(SearchResult::scored(record.item_id, term, similarity));
                }
            }
            Ok(())
        })?;

        let ranked = heap
            .into_inner()
            .map_err(|_| Error::store("result heap lock poisoned"))?
            .into_sorted_vec();
        info!(
            results = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scored comments"
        );

        let unique = dedupe_items(ranked);
        debug!(results = unique.len(), "after item dedup");

        let kept = suppress_same_author(
            self.store,
            model,
            unique,
            self.options.duplicate_threshold,
        )?;
        debug!(results = kept.len(), "after same-author suppression");

        Ok(assemble(kept, request.limit))
    }
}
