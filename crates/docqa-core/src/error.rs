use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load documents: {0}")]
    Load(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No valid index at {}: {reason}", path.display())]
    IndexNotFound { path: PathBuf, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding backend failed: {0}")]
    Embedding(String),

    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Index storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn index_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexNotFound { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
