// SPDX-License-Identifier: MIT OR Apache-2.0

//! threadrank - Semantic search over hiring thread comments
//!
//! Shared modules for the threadrank CLI tool: embedding ingestion,
//! vector storage and multi-term search with duplicate suppression.

pub mod cancel;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod import;
pub mod ingest;
pub mod output;
pub mod search;
pub mod workers;

pub use cancel::CancelToken;
pub use errors::{Error, Result};
