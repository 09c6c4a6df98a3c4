//! Error types for indexer operations.
//!
//! This module defines the crate-wide error enumeration using `thiserror`
//! so every component reports failures through the same type.

use thiserror::Error;

/// Custom error type covering every failure mode of the indexer, from
/// configuration problems to runtime failures in RPC communication,
/// database operations, and payload decoding.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Invalid or missing configuration values.
    ///
    /// Raised before the pipeline starts; always fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// Errors encountered during database operations.
    ///
    /// Wraps `sqlx::Error` via `#[from]` so storage code can propagate
    /// with the `?` operator.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transport-level failures talking to the node RPC or the REST gateway.
    ///
    /// These are transient from the pipeline's point of view: workers log
    /// them and drop the item, the chain remains replayable by height.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A payload was fetched successfully but could not be decoded.
    ///
    /// Kept distinct from [`IndexerError::Rpc`] so callers can fail fast
    /// instead of retrying a request that will never parse.
    #[error("decode error: {0}")]
    Decode(String),

    /// Failure establishing or maintaining an event subscription.
    ///
    /// Setup failures are fatal to the producer that requested the
    /// subscription.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// I/O errors from the host environment (config file reads, signal
    /// handler registration).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        IndexerError::Rpc(err.to_string())
    }
}

/// Type alias for Results using [`IndexerError`].
pub type Result<T> = std::result::Result<T, IndexerError>;
