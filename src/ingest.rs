// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding ingestion.
//!
//! Finds comments under the most recent posts of each category that have no
//! embedding for the embedder's model yet, embeds them with bounded
//! concurrency and inserts one record per comment. Writes are not
//! transactional across comments, so a failed run leaves earlier records in
//! place and a rerun picks up where it stopped.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::MAX_WINDOW;
use crate::embedding::{Embedder, EmbeddingRecord, EmbeddingStore, Item};
use crate::errors::{Error, Result};
use crate::workers::try_for_each_bounded;

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Title patterns of the threads to embed
    pub categories: Vec<String>,
    /// Simultaneous embedding calls
    pub concurrency: usize,
    /// Draw a progress bar on stderr
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            concurrency: 10,
            progress: false,
        }
    }
}

/// Counters from one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Posts scanned across all categories
    pub posts: usize,
    /// Comments without an embedding for the model
    pub pending: usize,
    /// Pending comments skipped for having no text
    pub skipped_empty: usize,
    /// Records written by this run
    pub embedded: usize,
}

pub struct IngestionPipeline<'a> {
    store: &'a dyn EmbeddingStore,
    embedder: &'a Embedder,
    options: IngestOptions,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        store: &'a dyn EmbeddingStore,
        embedder: &'a Embedder,
        options: IngestOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            options,
        }
    }

    /// Embeds every missing comment under the newest `window` posts of each
    /// category. `window` is clamped to [`MAX_WINDOW`].
    ///
    /// The first failure cancels outstanding work and is returned.
    pub fn run(&self, cancel: &CancelToken, window: usize) -> Result<IngestStats> {
        let model = self.embedder.model();
        let window = window.min(MAX_WINDOW);
        let mut stats = IngestStats::default();

        // Categories may overlap, so posts and comments are taken once each.
        let mut seen_posts = HashSet::new();
        let mut seen_items = HashSet::new();
        let mut pending = Vec::new();
        for category in &self.options.categories {
            let posts = self.store.items_by_category(category, window)?;
            debug!(category = %category, posts = posts.len(), "scanning category");
            for post in posts.iter().filter(|post| seen_posts.insert(post.id)) {
                stats.posts += 1;
                pending.extend(
                    self.missing_for_post(model, post)?
                        .into_iter()
                        .filter(|item| seen_items.insert(item.id)),
                );
            }
        }
        stats.pending = pending.len();

        let work: Vec<Item> = pending
            .into_iter()
            .filter(|item| !item.text.is_empty())
            .collect();
        stats.skipped_empty = stats.pending - work.len();

        info!(
            model,
            count = work.len(),
            skipped_empty = stats.skipped_empty,
            "creating embeddings"
        );

        let progress = if self.options.progress {
            let bar = ProgressBar::new(work.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let started = Instant::now();
        let written = AtomicUsize::new(0);
        let outcome = try_for_each_bounded(self.options.concurrency, cancel, work, |item| {
            let vector = self.embedder.embed(cancel, &item.text)?;
            // A sibling may have failed while this call was in flight.
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let record = EmbeddingRecord::new(item.id, model, vector);
            if self.store.insert_embedding(&record)? {
                written.fetch_add(1, Ordering::Relaxed);
            }
            progress.inc(1);
            Ok(())
        });
        stats.embedded = written.into_inner();

        match outcome {
            Ok(()) => {
                progress.finish_and_clear();
                info!(
                    model,
                    embedded = stats.embedded,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "embeddings created"
                );
                Ok(stats)
            }
            Err(err) => {
                progress.abandon_with_message("failed");
                Err(err)
            }
        }
    }

    /// Children of `post` that have no embedding for `model`.
    fn missing_for_post(&self, model: &str, post: &Item) -> Result<Vec<Item>> {
        let children = self.store.children_of(post.id)?;
        let embedded: HashSet<i64> = self
            .store
            .embeddings_by_parent(model, post.id)?
            .into_iter()
            .map(|record| record.item_id)
            .collect();

        Ok(children
            .into_iter()
            .filter(|child| !embedded.contains(&child.id))
            .collect())
    }
}
