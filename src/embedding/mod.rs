// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - providers, vector encoding and storage
//!
//! Comments are embedded once per model and stored as length-prefixed
//! little-endian blobs; search reads them back and scores by dot product.

pub mod codec;
pub mod provider;
pub mod similarity;
pub mod storage;

pub use provider::{
    CommandProvider, DummyProvider, Embedder, EmbeddingProvider, HttpProvider, Normalization,
    DEFAULT_EMBEDDING_DIM,
};
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::FastEmbedder;
pub use storage::{EmbeddingRecord, EmbeddingStore, Item, SqliteStore};
