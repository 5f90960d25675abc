//! Staging errors.

use auditflow_ids::IdParseError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageError>;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("No files were provided")]
    NoFiles,

    #[error("Too many files: {count} (maximum {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("File '{name}' is {size} bytes (maximum {max})")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Batch is {total} bytes (maximum {max})")]
    TotalTooLarge { total: u64, max: u64 },

    #[error("File '{name}' is empty")]
    EmptyFile { name: String },

    #[error("File '{name}' has a disallowed type '{extension}'")]
    DisallowedExtension { name: String, extension: String },

    #[error("File '{name}' declared {declared} bytes but sent {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    #[error("Could not find a free name for '{name}' after repeated collisions")]
    Collision { name: String },

    #[error(transparent)]
    InvalidBatchId(#[from] IdParseError),

    #[error("Batch not found: {0}")]
    NotFound(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Batch manifest error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for rejections caused by the request itself rather than storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StageError::NoFiles
                | StageError::TooManyFiles { .. }
                | StageError::FileTooLarge { .. }
                | StageError::TotalTooLarge { .. }
                | StageError::EmptyFile { .. }
                | StageError::DisallowedExtension { .. }
                | StageError::SizeMismatch { .. }
                | StageError::InvalidBatchId(_)
        )
    }
}
