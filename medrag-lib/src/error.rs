//! Error types for medrag

use thiserror::Error;

/// Result type alias for medrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in medrag operations
#[derive(Error, Debug)]
pub enum Error {
    /// Chunk sizing, `top_k` or another caller-supplied parameter is out of range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A rebuild was requested with no source rows
    #[error("no source rows to index: {0}")]
    EmptySource(String),

    /// The embedding gateway failed or returned an unusable payload
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The rerank gateway timed out, refused the connection or answered with an error
    #[error("rerank unavailable: {0}")]
    RerankUnavailable(String),

    /// The vector index signalled a failure while answering a query.
    ///
    /// Zero hits is not an error; this is only raised when the collaborator
    /// itself reports one.
    #[error("retrieval failed: {0}")]
    EmptyResult(String),

    /// Failed to write to or manage the vector store
    #[error("store error: {0}")]
    Store(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
