// SPDX-License-Identifier: MIT OR Apache-2.0

mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use common::{comment, post, store_with, FixedProvider, HIRING};
use threadrank::embedding::{
    DummyProvider, Embedder, EmbeddingProvider, EmbeddingRecord, EmbeddingStore, Item,
    Normalization, SqliteStore,
};
use threadrank::ingest::{IngestOptions, IngestionPipeline};
use threadrank::search::{SearchOptions, SearchRequest, VectorSearch};
use threadrank::{CancelToken, Error};

fn ingest_options() -> IngestOptions {
    IngestOptions {
        categories: vec![HIRING.to_string()],
        ..IngestOptions::default()
    }
}

fn request(terms: &[&str], limit: usize) -> SearchRequest {
    SearchRequest {
        window: 3,
        category: HIRING.to_string(),
        terms: terms.iter().map(|t| t.to_string()).collect(),
        limit,
    }
}

#[test]
fn ingestion_is_idempotent() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (March)"),
        comment(10, 1, "alice", "Rust backend, remote"),
        comment(11, 1, "bob", "Go platform team"),
        comment(12, 1, "carol", ""),
    ]);
    let provider = FixedProvider::new(&[
        ("Rust backend, remote", vec![3.0, 4.0]),
        ("Go platform team", vec![0.0, 1.0]),
    ]);
    let calls = provider.counter();
    let embedder = Embedder::new(Box::new(provider), Normalization::Always);
    let pipeline = IngestionPipeline::new(&store, &embedder, ingest_options());

    let first = pipeline.run(&CancelToken::new(), 3).unwrap();
    assert_eq!(first.posts, 1);
    assert_eq!(first.pending, 3);
    assert_eq!(first.skipped_empty, 1);
    assert_eq!(first.embedded, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let second = pipeline.run(&CancelToken::new(), 3).unwrap();
    assert_eq!(second.embedded, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.count_embeddings("fixed").unwrap(), 2);

    // Stored vectors are unit length.
    let stored = store.embeddings_by_ids("fixed", &[10]).unwrap();
    assert_eq!(stored[0].vector, vec![0.6, 0.8]);
}

#[test]
fn ingestion_window_is_clamped_and_newest_first() {
    let mut items = Vec::new();
    for n in 1..=8 {
        items.push(post(n, &format!("Ask HN: Who is hiring? ({})", n)));
        items.push(comment(100 + n, n, "author", &format!("job {}", n)));
    }
    let store = store_with(&items);
    let embedder = Embedder::new(Box::new(DummyProvider::new(16)), Normalization::Always);
    let pipeline = IngestionPipeline::new(&store, &embedder, ingest_options());

    let stats = pipeline.run(&CancelToken::new(), 50).unwrap();
    assert_eq!(stats.posts, 6);
    assert_eq!(stats.embedded, 6);
    assert!(store.embeddings_by_ids("dummy", &[101, 102]).unwrap().is_empty());
    assert_eq!(store.embeddings_by_ids("dummy", &[103, 108]).unwrap().len(), 2);
}

#[test]
fn ingestion_failure_is_returned_and_rerun_resumes() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (April)"),
        comment(10, 1, "alice", "known"),
        comment(11, 1, "bob", "unknown"),
    ]);
    let failing = Embedder::new(
        Box::new(FixedProvider::new(&[("known", vec![1.0, 0.0])])),
        Normalization::Always,
    );
    let cancel = CancelToken::new();
    let err = IngestionPipeline::new(&store, &failing, ingest_options())
        .run(&cancel, 3)
        .unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
    assert!(store.embeddings_by_ids("fixed", &[11]).unwrap().is_empty());

    let working = Embedder::new(
        Box::new(FixedProvider::new(&[
            ("known", vec![1.0, 0.0]),
            ("unknown", vec![0.0, 1.0]),
        ])),
        Normalization::Always,
    );
    let stats = IngestionPipeline::new(&store, &working, ingest_options())
        .run(&CancelToken::new(), 3)
        .unwrap();
    assert!(stats.embedded >= 1);
    assert_eq!(store.count_embeddings("fixed").unwrap(), 2);
}

/// "fail" errors quickly; every other text succeeds only after a long call.
struct SlowSiblingsProvider;

impl EmbeddingProvider for SlowSiblingsProvider {
    fn model_id(&self) -> &str {
        "slow"
    }

    fn embed(&self, _cancel: &CancelToken, text: &str) -> anyhow::Result<Vec<f32>> {
        if text == "fail" {
            thread::sleep(Duration::from_millis(50));
            anyhow::bail!("boom");
        }
        thread::sleep(Duration::from_millis(300));
        Ok(vec![1.0, 0.0])
    }
}

#[test]
fn in_flight_embeddings_are_not_written_after_a_failure() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (April)"),
        comment(10, 1, "alice", "fail"),
        comment(11, 1, "bob", "slow one"),
        comment(12, 1, "carol", "slow two"),
    ]);
    let embedder = Embedder::new(Box::new(SlowSiblingsProvider), Normalization::Always);
    let cancel = CancelToken::new();

    let err = IngestionPipeline::new(&store, &embedder, ingest_options())
        .run(&cancel, 3)
        .unwrap_err();

    assert!(matches!(err, Error::Provider(_)));
    assert!(err.to_string().contains("boom"));
    assert!(cancel.is_cancelled());
    assert_eq!(store.count_embeddings("slow").unwrap(), 0);
}

#[test]
fn overlapping_categories_embed_each_comment_once() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (May)"),
        comment(10, 1, "alice", "rust"),
        comment(11, 1, "bob", "go"),
    ]);
    let provider = FixedProvider::new(&[("rust", vec![1.0, 0.0]), ("go", vec![0.0, 1.0])]);
    let calls = provider.counter();
    let embedder = Embedder::new(Box::new(provider), Normalization::Always);
    let options = IngestOptions {
        categories: vec![HIRING.to_string(), "Ask HN: Who is%".to_string()],
        ..IngestOptions::default()
    };

    let stats = IngestionPipeline::new(&store, &embedder, options)
        .run(&CancelToken::new(), 3)
        .unwrap();
    assert_eq!(stats.posts, 1);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.embedded, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Store that never reports existing embeddings, so every comment looks new.
struct ForgetfulStore(SqliteStore);

impl EmbeddingStore for ForgetfulStore {
    fn items_by_category(&self, category: &str, window: usize) -> threadrank::Result<Vec<Item>> {
        self.0.items_by_category(category, window)
    }

    fn children_of(&self, item_id: i64) -> threadrank::Result<Vec<Item>> {
        self.0.children_of(item_id)
    }

    fn embeddings_by_parent(
        &self,
        _model: &str,
        _parent_id: i64,
    ) -> threadrank::Result<Vec<EmbeddingRecord>> {
        Ok(Vec::new())
    }

    fn embeddings_by_ids(
        &self,
        model: &str,
        ids: &[i64],
    ) -> threadrank::Result<Vec<EmbeddingRecord>> {
        self.0.embeddings_by_ids(model, ids)
    }

    fn items_by_ids(&self, ids: &[i64]) -> threadrank::Result<Vec<Item>> {
        self.0.items_by_ids(ids)
    }

    fn insert_embedding(&self, record: &EmbeddingRecord) -> threadrank::Result<bool> {
        self.0.insert_embedding(record)
    }
}

#[test]
fn conflicting_inserts_are_not_counted() {
    let store = ForgetfulStore(store_with(&[
        post(1, "Ask HN: Who is hiring? (May)"),
        comment(10, 1, "alice", "rust"),
    ]));
    let embedder = Embedder::new(
        Box::new(FixedProvider::new(&[("rust", vec![1.0, 0.0])])),
        Normalization::Always,
    );
    let pipeline = IngestionPipeline::new(&store, &embedder, ingest_options());

    assert_eq!(pipeline.run(&CancelToken::new(), 3).unwrap().embedded, 1);
    let again = pipeline.run(&CancelToken::new(), 3).unwrap();
    assert_eq!(again.pending, 1);
    assert_eq!(again.embedded, 0);
    assert_eq!(store.0.count_embeddings("fixed").unwrap(), 1);
}

#[test]
fn orthogonal_vectors_rank_by_term() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (May)"),
        comment(10, 1, "alice", "a"),
        comment(11, 1, "bob", "b"),
    ]);
    store
        .insert_embedding(&EmbeddingRecord::new(10, "fixed", vec![1.0, 0.0]))
        .unwrap();
    store
        .insert_embedding(&EmbeddingRecord::new(11, "fixed", vec![0.0, 1.0]))
        .unwrap();
    let embedder = Embedder::new(
        Box::new(FixedProvider::new(&[("x", vec![1.0, 0.0]), ("y", vec![0.0, 1.0])])),
        Normalization::Always,
    );
    let search = VectorSearch::new(&store, &embedder, SearchOptions::default());

    let results = search.search(&CancelToken::new(), &request(&["x"], 10)).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!((results[0].item_id, results[0].similarity), (10, 1.0));
    assert_eq!((results[1].item_id, results[1].similarity), (11, 0.0));

}

#[test]
fn limit_one_keeps_the_best_score_across_terms() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (May)"),
        comment(10, 1, "alice", "a"),
        comment(11, 1, "bob", "b"),
    ]);
    store
        .insert_embedding(&EmbeddingRecord::new(10, "fixed", vec![1.0, 0.0]))
        .unwrap();
    store
        .insert_embedding(&EmbeddingRecord::new(11, "fixed", vec![0.6, 0.8]))
        .unwrap();
    // "y" peaks at 0.8 on bob, "x" peaks at 1.0 on alice.
    let embedder = Embedder::new(
        Box::new(FixedProvider::new(&[("x", vec![1.0, 0.0]), ("y", vec![0.0, 1.0])])),
        Normalization::Always,
    );

    let results = VectorSearch::new(&store, &embedder, SearchOptions::default())
        .search(&CancelToken::new(), &request(&["y", "x"], 1))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item_id, 10);
    assert_eq!(results[0].term, "x");
    assert_eq!(results[0].similarity, 1.0);
}

fn two_post_store(dir: &tempfile::TempDir) -> (SqliteStore, std::path::PathBuf) {
    let path = dir.path().join("threadrank.sqlite");
    let store = SqliteStore::open(&path).unwrap();
    store
        .insert_items(&[
            post(1, "Ask HN: Who is hiring? (May)"),
            post(2, "Ask HN: Who is hiring? (June)"),
            comment(10, 1, "alice", "a"),
            comment(20, 2, "bob", "b"),
        ])
        .unwrap();
    store
        .insert_embedding(&EmbeddingRecord::new(10, "fixed", vec![1.0, 0.0]))
        .unwrap();
    (store, path)
}

fn x_embedder() -> Embedder {
    Embedder::new(
        Box::new(FixedProvider::new(&[("x", vec![1.0, 0.0])])),
        Normalization::Always,
    )
}

#[test]
fn corrupt_vector_under_one_post_fails_the_search() {
    let dir = tempfile::TempDir::new().unwrap();
    let (store, path) = two_post_store(&dir);
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute(
            "INSERT INTO embeddings (item_id, model, embedding, created_at, updated_at) \
             VALUES (20, 'fixed', x'05000000', 0, 0)",
            [],
        )
        .unwrap();

    let embedder = x_embedder();
    let err = VectorSearch::new(&store, &embedder, SearchOptions::default())
        .search(&CancelToken::new(), &request(&["x"], 5))
        .unwrap_err();
    assert!(matches!(err, Error::MalformedBlob { declared: 5, .. }));
}

#[test]
fn stored_vector_of_another_dimension_fails_the_search() {
    let dir = tempfile::TempDir::new().unwrap();
    let (store, _path) = two_post_store(&dir);
    store
        .insert_embedding(&EmbeddingRecord::new(20, "fixed", vec![1.0, 0.0, 0.0]))
        .unwrap();

    let embedder = x_embedder();
    let err = VectorSearch::new(&store, &embedder, SearchOptions::default())
        .search(&CancelToken::new(), &request(&["x"], 5))
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}

#[test]
fn same_author_reposts_collapse() {
    let store = store_with(&[
        post(1, "Ask HN: Who is hiring? (May)"),
        post(2, "Ask HN: Who is hiring? (June)"),
        comment(10, 1, "alice", "same post"),
        comment(20, 2, "alice", "same post"),
        comment(21, 2, "bob", "same post"),
    ]);
    let embedder = Embedder::new(
        Box::new(FixedProvider::new(&[
            ("same post", vec![1.0, 0.0]),
            ("query", vec![1.0, 0.0]),
        ])),
        Normalization::Always,
    );
    IngestionPipeline::new(&store, &embedder, ingest_options())
        .run(&CancelToken::new(), 3)
        .unwrap();

    let results = VectorSearch::new(&store, &embedder, SearchOptions::default())
        .search(&CancelToken::new(), &request(&["query"], 10))
        .unwrap();
    let authors: Vec<&str> = results
        .iter()
        .map(|r| r.item.as_ref().unwrap().author.as_str())
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(authors.iter().filter(|a| **a == "alice").count(), 1);
    assert!(authors.contains(&"bob"));
}

#[test]
fn results_are_bounded_and_unique() {
    let mut items = vec![post(1, "Ask HN: Who is hiring? (July)")];
    for n in 0..40 {
        let text = format!("role {} in team {}", n, n % 7);
        items.push(comment(100 + n, 1, &format!("user{}", n), &text));
    }
    let store = store_with(&items);
    let embedder = Embedder::new(Box::new(DummyProvider::new(32)), Normalization::Always);
    IngestionPipeline::new(&store, &embedder, ingest_options())
        .run(&CancelToken::new(), 1)
        .unwrap();

    let search = VectorSearch::new(&store, &embedder, SearchOptions::default());
    for limit in [1, 5, 17] {
        let results = search
            .search(&CancelToken::new(), &request(&["role", "team 3", "in"], limit))
            .unwrap();
        assert!(results.len() <= limit);
        let ids: HashSet<i64> = results.iter().map(|r| r.item_id).collect();
        assert_eq!(ids.len(), results.len());
        assert!(results
            .windows(2)
            .all(|pair| pair[0].similarity >= pair[1].similarity));
    }
}

#[test]
fn empty_terms_skip_the_provider() {
    let store = store_with(&[post(1, "Ask HN: Who is hiring? (May)")]);
    let provider = FixedProvider::new(&[]);
    let calls = provider.counter();
    let embedder = Embedder::new(Box::new(provider), Normalization::Always);
    let results = VectorSearch::new(&store, &embedder, SearchOptions::default())
        .search(&CancelToken::new(), &request(&[], 10))
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("threadrank.sqlite");
    {
        let store = SqliteStore::open(&path).unwrap();
        store
            .insert_items(&[post(1, "Ask HN: Who is hiring? (May)"), comment(2, 1, "a", "t")])
            .unwrap();
        store
            .insert_embedding(&EmbeddingRecord::new(2, "m", vec![0.5, -0.5]))
            .unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    let records = store.embeddings_by_parent("m", 1).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].vector, vec![0.5, -0.5]);
}
