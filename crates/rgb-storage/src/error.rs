//! Storage error types.

use rgb_spatial::ChunkPos;
use thiserror::Error;

/// Storage error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// LMDB error.
    #[error("database error: {0}")]
    Database(#[from] heed::Error),

    /// Record (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage was closed or its worker exited.
    #[error("storage is closed")]
    Closed,

    /// A load was dropped before it produced a result.
    #[error("load of column {0} was abandoned")]
    LoadAbandoned(ChunkPos),

    /// Injected or backend-specific read failure.
    #[error("failed to read column {pos}: {reason}")]
    Read { pos: ChunkPos, reason: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
