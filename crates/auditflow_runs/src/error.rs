use auditflow_ids::IdParseError;
use auditflow_protocol::ArtifactFormat;
use auditflow_security::ContainmentError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunStoreError {
    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunStoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RunStoreError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("{0}")]
    UnknownFormat(String),

    #[error("Run not found: {0}")]
    NotFound(String),

    /// The manifest has no link for an external format yet.
    #[error("No {format} link is configured for run {run_id}")]
    NotConfigured {
        run_id: String,
        format: ArtifactFormat,
    },

    #[error("Run {run_id} is still running; no {format} artifact yet")]
    StillRunning {
        run_id: String,
        format: ArtifactFormat,
    },

    #[error("Run {run_id} finished without a {format} artifact")]
    NoArtifact {
        run_id: String,
        format: ArtifactFormat,
    },

    #[error(transparent)]
    Containment(#[from] ContainmentError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    /// Callers may retry these later.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ArtifactError::StillRunning { .. })
    }
}

impl From<RunStoreError> for ArtifactError {
    fn from(err: RunStoreError) -> Self {
        match err {
            RunStoreError::InvalidId(err) => ArtifactError::InvalidId(err),
            RunStoreError::NotFound(run_id) => ArtifactError::NotFound(run_id),
            RunStoreError::Io { path, source } => ArtifactError::Io { path, source },
        }
    }
}
