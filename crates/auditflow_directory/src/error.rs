use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Roster database error: {0}")]
    Database(#[from] auditflow_db::DbError),

    #[error("Batch lookup failed: {0}")]
    Batch(#[from] auditflow_intake::StageError),

    #[error("Run listing failed: {0}")]
    Runs(#[from] auditflow_runs::RunStoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No case manager column in roster {source_name} (headers: {headers})")]
    MissingColumn {
        source_name: String,
        headers: String,
    },

    #[error("Unsupported roster format: {0}")]
    UnsupportedFormat(String),

    #[error("Object storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object storage error: {0}")]
    ObjectStore(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DirectoryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
