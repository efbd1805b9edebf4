// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use threadrank::embedding::{EmbeddingProvider, Item, SqliteStore};
use threadrank::CancelToken;

pub const HIRING: &str = "Ask HN: Who is hiring?%";

pub fn post(id: i64, title: &str) -> Item {
    Item {
        id,
        parent_id: None,
        author: "whoishiring".to_string(),
        text: String::new(),
        created_at: id,
        title: title.to_string(),
    }
}

pub fn comment(id: i64, parent: i64, author: &str, text: &str) -> Item {
    Item {
        id,
        parent_id: Some(parent),
        author: author.to_string(),
        text: text.to_string(),
        created_at: id,
        title: String::new(),
    }
}

pub fn store_with(items: &[Item]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert_items(items).unwrap();
    store
}

/// Returns fixed vectors keyed by text and counts calls.
pub struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl FixedProvider {
    pub fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle that keeps counting calls after the provider is boxed.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl EmbeddingProvider for FixedProvider {
    fn model_id(&self) -> &str {
        "fixed"
    }

    fn embed(&self, _cancel: &CancelToken, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no vector for {:?}", text))
    }
}
