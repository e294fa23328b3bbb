//! Transcript index errors

use podsearch_types::DistanceMetric;
use thiserror::Error;

/// Result alias for transcript index operations
pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("collection not found: {collection} in {path}")]
    NotFound { collection: String, path: String },

    #[error(
        "collection {collection} was created with dimension {stored_dimension} ({stored_metric}), configured {dimension} ({metric})"
    )]
    ConfigMismatch {
        collection: String,
        stored_dimension: usize,
        stored_metric: DistanceMetric,
        dimension: usize,
        metric: DistanceMetric,
    },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}
