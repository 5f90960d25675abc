//! Auditflow Test Utilities
//!
//! Temporary storage roots populated the way the analyzer and the stager
//! leave them on disk: run directories with manifests, logs and artifacts,
//! legacy flat manifests, staged batches and flat output files.
//!
//! # Usage
//!
//! ```rust,ignore
//! use auditflow_test_utils::StorageFixture;
//!
//! let fixture = StorageFixture::new();
//! fixture
//!     .run("20261018-101500-3fa2c1d9")
//!     .status("done")
//!     .xlsx("audit___all__.xlsx")
//!     .write();
//! fixture.write_output("audit___all__.xlsx", b"xlsx");
//! ```

mod run;

pub use run::RunFixture;

use auditflow_ids::BatchId;
use auditflow_protocol::types::{BatchManifest, FileKind, StagedFile};
use auditflow_protocol::StorageRoot;
use chrono::Utc;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// A storage root inside a temp directory, removed on drop.
pub struct StorageFixture {
    tmp: TempDir,
    storage: StorageRoot,
}

impl StorageFixture {
    /// Storage at `<tmp>/storage` with the default `outputs/` subtree.
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let storage = StorageRoot::new(tmp.path().join("storage"));
        storage.ensure().expect("create storage layout");
        Self { tmp, storage }
    }

    pub fn storage(&self) -> &StorageRoot {
        &self.storage
    }

    /// The temp directory that contains the storage root.
    pub fn tmp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Start describing a run; nothing touches disk until [`RunFixture::write`].
    pub fn run(&self, run_id: &str) -> RunFixture<'_> {
        RunFixture::new(self, run_id)
    }

    /// Create only the run directory, as a launcher does before the analyzer
    /// writes anything.
    pub fn run_dir_only(&self, run_id: &str) -> PathBuf {
        let dir = self.storage.runs_dir().join(run_id);
        fs::create_dir_all(&dir).expect("create run dir");
        dir
    }

    /// Write a legacy flat manifest at `runs/<runId>`.
    pub fn write_legacy_manifest(&self, run_id: &str, manifest: &serde_json::Value) -> PathBuf {
        let path = self.storage.runs_dir().join(run_id);
        let body = serde_json::to_vec_pretty(manifest).expect("serialize manifest");
        fs::write(&path, body).expect("write legacy manifest");
        path
    }

    /// Write a legacy flat log at `runs/<runId>.log`.
    pub fn write_legacy_log(&self, run_id: &str, text: &str) -> PathBuf {
        let path = self.storage.runs_dir().join(format!("{}.log", run_id));
        fs::write(&path, text).expect("write legacy log");
        path
    }

    /// Write a file relative to the shared output root.
    pub fn write_output(&self, relative: &str, body: &[u8]) -> PathBuf {
        let path = self.storage.outputs_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create output parent");
        }
        fs::write(&path, body).expect("write output");
        path
    }

    /// Write a staged batch with its `batch.json`, bypassing validation.
    pub fn write_batch(&self, files: &[(FileKind, &str, &[u8])]) -> BatchManifest {
        let batch_id = BatchId::new();
        for kind in FileKind::ALL {
            fs::create_dir_all(self.storage.batch_kind_dir(&batch_id, kind))
                .expect("create batch subdir");
        }

        let mut staged = Vec::with_capacity(files.len());
        for (kind, name, body) in files {
            let path = self.storage.batch_kind_dir(&batch_id, *kind).join(name);
            fs::write(&path, body).expect("write staged file");
            staged.push(StagedFile {
                original_name: name.to_string(),
                saved_name: name.to_string(),
                kind: *kind,
                relative_path: format!("{}/{}", kind.dir_name(), name),
                byte_size: body.len() as u64,
                sha256: String::new(),
            });
        }

        let manifest = BatchManifest {
            batch_id: batch_id.to_string(),
            created_at: Utc::now(),
            total_bytes: staged.iter().map(|file| file.byte_size).sum(),
            files: staged,
        };
        let body = serde_json::to_vec_pretty(&manifest).expect("serialize batch manifest");
        fs::write(self.storage.batch_manifest(&batch_id), body).expect("write batch manifest");
        manifest
    }

    /// Path of a batch's `batch.json` by its string id.
    pub fn batch_manifest_path(&self, batch_id: &str) -> PathBuf {
        self.storage
            .uploads_dir()
            .join(batch_id)
            .join(auditflow_protocol::defaults::BATCH_MANIFEST_FILE)
    }
}

impl Default for StorageFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Set a path's modification time to `secs_ago` seconds in the past.
pub fn set_age(path: &Path, secs_ago: u64) {
    let when = SystemTime::now() - Duration::from_secs(secs_ago);
    filetime::set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_layout() {
        let fixture = StorageFixture::new();
        assert!(fixture.storage().uploads_dir().is_dir());
        assert!(fixture.storage().runs_dir().is_dir());
        assert!(fixture.storage().outputs_dir().is_dir());
    }

    #[test]
    fn writes_batches_with_manifest() {
        let fixture = StorageFixture::new();
        let manifest = fixture.write_batch(&[(FileKind::TabularData, "roster.csv", b"cm\nJane\n")]);
        let path = fixture.batch_manifest_path(&manifest.batch_id);
        assert!(path.is_file());
        assert_eq!(manifest.files[0].relative_path, "tabular-data/roster.csv");
    }
}
