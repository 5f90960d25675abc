//! Storage root and its fixed subtrees.
//!
//! ```text
//! <root>/
//!   uploads/<batchId>/{documents,tabular-data,other}/...  batch.json
//!   runs/<runId>/{manifest.json, run.log, artifacts/}
//!   runs/<runId>            legacy flat manifest
//!   runs/<runId>.log        legacy flat log
//!   outputs/                shared output root (overridable)
//! ```
//!
//! The layout is shared with the external analyzer, so every path here is
//! part of the interop contract.

use crate::defaults::{
    ARTIFACTS_DIR, BATCH_MANIFEST_FILE, LEGACY_LOG_EXTENSION, OUTPUTS_DIR, RUNS_DIR,
    RUN_LOG_FILE, RUN_MANIFEST_FILE, UPLOADS_DIR,
};
use crate::types::FileKind;
use auditflow_ids::{BatchId, RunId};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    root: PathBuf,
    outputs: PathBuf,
}

impl StorageRoot {
    /// Storage root with the default `outputs/` subtree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let outputs = root.join(OUTPUTS_DIR);
        Self { root, outputs }
    }

    /// Override the shared output root (the analyzer may write elsewhere).
    pub fn with_outputs(mut self, outputs: impl Into<PathBuf>) -> Self {
        self.outputs = outputs.into();
        self
    }

    /// Create the uploads, runs and outputs directories if missing.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.runs_dir())?;
        std::fs::create_dir_all(self.outputs_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR)
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs
    }

    pub fn batch_dir(&self, batch_id: &BatchId) -> PathBuf {
        self.uploads_dir().join(batch_id.as_str())
    }

    pub fn batch_kind_dir(&self, batch_id: &BatchId, kind: FileKind) -> PathBuf {
        self.batch_dir(batch_id).join(kind.dir_name())
    }

    pub fn batch_manifest(&self, batch_id: &BatchId) -> PathBuf {
        self.batch_dir(batch_id).join(BATCH_MANIFEST_FILE)
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir().join(run_id.as_str())
    }

    pub fn run_manifest(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(RUN_MANIFEST_FILE)
    }

    pub fn run_log(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(RUN_LOG_FILE)
    }

    pub fn run_artifacts_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(ARTIFACTS_DIR)
    }

    /// Flat manifest file named by the run id directly in the runs root.
    pub fn legacy_manifest(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir().join(run_id.as_str())
    }

    pub fn legacy_log(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir()
            .join(format!("{}.{}", run_id.as_str(), LEGACY_LOG_EXTENSION))
    }
}
