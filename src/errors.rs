// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the ingestion pipeline and the search engine.

use thiserror::Error;

/// Boxed source error carried by the provider and store variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error here is fatal to the operation in progress. Nothing retries.
#[derive(Debug, Error)]
pub enum Error {
    /// A text-to-vector call failed or produced no usable vector.
    #[error("embedding provider failed: {0}")]
    Provider(#[source] BoxError),

    /// A persistence read or write failed.
    #[error("storage error: {0}")]
    Store(#[source] BoxError),

    /// A stored vector blob could not be decoded.
    #[error("malformed vector blob: declared {declared} floats, {available} payload bytes")]
    MalformedBlob { declared: usize, available: usize },

    /// Two vectors of different length were compared.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The operation was cancelled before any worker failed.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn provider(err: impl Into<BoxError>) -> Self {
        Error::Provider(err.into())
    }

    pub fn store(err: impl Into<BoxError>) -> Self {
        Error::Store(err.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(Box::new(err))
    }
}
