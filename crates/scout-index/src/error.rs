//! Error types for scout-index.

use std::num::TryFromIntError;

/// Errors that can occur during indexing and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error outside of per-file reads (those become [`crate::ScanSkip`]).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `SQLite` read error.
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Committing a reconciliation pass failed; the previous index state is intact.
    #[error("failed to commit reconciliation pass: {0}")]
    StoreWrite(#[source] sqlx::Error),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Llm(#[from] scout_llm::LlmError),

    #[error("embedding dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("stored embedding for {path} is corrupt")]
    CorruptEmbedding { path: String },

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
