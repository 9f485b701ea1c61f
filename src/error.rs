//! Error type shared by the indexing and query pipeline

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Vector length disagrees with the dimensionality fixed by the first insert
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Row id outside the fragment store
    #[error("row {row_id} not found (store holds {len} fragments)")]
    NotFound { row_id: usize, len: usize },

    #[error("collection '{name}' not found at {}", path.display())]
    CollectionNotFound { name: String, path: PathBuf },

    #[error("unreadable document {}: {reason}", path.display())]
    UnreadableDocument { path: PathBuf, reason: String },

    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("corrupt collection: {0}")]
    CorruptCollection(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
