//! BatchStager: validate a whole upload, then stream it into a fresh batch.

use crate::catalog::StagedBatch;
use crate::classify::Classifier;
use crate::error::{Result, StageError};
use crate::limits::StagingLimits;
use crate::writer::write_exclusive;
use auditflow_ids::BatchId;
use auditflow_protocol::defaults::BATCH_MANIFEST_FILE;
use auditflow_protocol::types::{BatchManifest, FileKind, StagedFile};
use auditflow_protocol::StorageRoot;
use auditflow_security::sanitize_upload_name;
use chrono::Utc;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::{info, warn};

/// One named byte stream from the caller.
pub struct UploadFile {
    pub name: String,
    /// Declared length; checked against limits before any I/O and against the
    /// stream while writing.
    pub size: u64,
    pub body: Box<dyn AsyncRead + Send + Unpin>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, size: u64, body: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            name: name.into(),
            size,
            body,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::new(name, size, Box::new(Cursor::new(bytes)))
    }

    /// Open a local file; the upload name is the path's basename.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|err| StageError::io(path, err))?;
        let size = file
            .metadata()
            .await
            .map_err(|err| StageError::io(path, err))?
            .len();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, size, Box::new(file)))
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Stages uploads under `<storage>/uploads/`.
#[derive(Debug, Clone)]
pub struct BatchStager {
    storage: StorageRoot,
    limits: StagingLimits,
    classifier: Classifier,
}

struct Planned {
    original_name: String,
    sanitized: String,
    kind: FileKind,
}

impl BatchStager {
    pub fn new(storage: StorageRoot) -> Self {
        Self {
            storage,
            limits: StagingLimits::default(),
            classifier: Classifier::default(),
        }
    }

    pub fn with_limits(mut self, limits: StagingLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn limits(&self) -> &StagingLimits {
        &self.limits
    }

    /// Validate every file, then write them all into a new batch.
    ///
    /// Either the whole batch is committed (files plus `batch.json`) or the
    /// batch directory is removed and nothing remains.
    pub async fn stage(&self, files: Vec<UploadFile>) -> Result<StagedBatch> {
        let plan = self.validate(&files)?;

        let batch_id = BatchId::new();
        let batch_dir = self.storage.batch_dir(&batch_id);

        match self.write_batch(&batch_id, &batch_dir, files, plan).await {
            Ok(staged) => {
                info!(
                    batch_id = %batch_id,
                    files = staged.manifest.files.len(),
                    total_bytes = staged.manifest.total_bytes,
                    "Batch staged"
                );
                Ok(staged)
            }
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "Staging failed; removing batch");
                if let Err(cleanup) = tokio::fs::remove_dir_all(&batch_dir).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(batch_dir = %batch_dir.display(), error = %cleanup, "Failed to remove batch directory");
                    }
                }
                Err(err)
            }
        }
    }

    /// All checks that can be made from names and declared sizes.
    fn validate(&self, files: &[UploadFile]) -> Result<Vec<Planned>> {
        self.limits.check_count(files.len())?;

        let mut total: u64 = 0;
        let mut plan = Vec::with_capacity(files.len());
        for file in files {
            let sanitized = sanitize_upload_name(&file.name);
            self.limits.check_file(&sanitized, file.size)?;
            if !self.classifier.is_allowed(&sanitized) {
                return Err(StageError::DisallowedExtension {
                    extension: Classifier::extension_of(&sanitized).unwrap_or_default(),
                    name: sanitized,
                });
            }
            total = total.saturating_add(file.size);
            plan.push(Planned {
                original_name: file.name.clone(),
                kind: self.classifier.classify(&sanitized),
                sanitized,
            });
        }
        self.limits.check_total(total)?;
        Ok(plan)
    }

    async fn write_batch(
        &self,
        batch_id: &BatchId,
        batch_dir: &Path,
        files: Vec<UploadFile>,
        plan: Vec<Planned>,
    ) -> Result<StagedBatch> {
        for kind in FileKind::ALL {
            let dir = self.storage.batch_kind_dir(batch_id, kind);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|err| StageError::io(&dir, err))?;
        }

        let mut staged = Vec::with_capacity(files.len());
        for (mut file, planned) in files.into_iter().zip(plan) {
            let dir = self.storage.batch_kind_dir(batch_id, planned.kind);
            let written =
                write_exclusive(&dir, &planned.sanitized, &mut file.body, file.size).await?;
            staged.push(StagedFile {
                original_name: planned.original_name,
                relative_path: format!("{}/{}", planned.kind.dir_name(), written.saved_name),
                saved_name: written.saved_name,
                kind: planned.kind,
                byte_size: written.byte_size,
                sha256: written.sha256,
            });
        }

        let manifest = BatchManifest {
            batch_id: batch_id.to_string(),
            created_at: Utc::now(),
            total_bytes: staged.iter().map(|file| file.byte_size).sum(),
            files: staged,
        };
        write_manifest(batch_dir, &manifest).await?;

        Ok(StagedBatch {
            batch_id: batch_id.clone(),
            root: batch_dir.to_path_buf(),
            manifest,
        })
    }
}

/// Atomic write via temp file + rename.
async fn write_manifest(batch_dir: &Path, manifest: &BatchManifest) -> Result<()> {
    let body = serde_json::to_vec_pretty(manifest)?;
    let temp_path = batch_dir.join(format!(".tmp_{}", uuid::Uuid::new_v4()));
    let final_path = batch_dir.join(BATCH_MANIFEST_FILE);
    tokio::fs::write(&temp_path, body)
        .await
        .map_err(|err| StageError::io(&temp_path, err))?;
    tokio::fs::rename(&temp_path, &final_path)
        .await
        .map_err(|err| StageError::io(&final_path, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditflow_test_utils::StorageFixture;

    fn stager(fixture: &StorageFixture) -> BatchStager {
        BatchStager::new(fixture.storage().clone())
    }

    #[tokio::test]
    async fn validation_happens_before_any_io() {
        let fixture = StorageFixture::new();
        let err = stager(&fixture)
            .stage(vec![
                UploadFile::from_bytes("a.pdf", b"%PDF".to_vec()),
                UploadFile::from_bytes("payload.exe", b"MZ".to_vec()),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::DisallowedExtension { ref extension, .. } if extension == "exe"));
        assert!(err.is_validation());
        assert_eq!(
            std::fs::read_dir(fixture.storage().uploads_dir()).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let fixture = StorageFixture::new();
        let err = stager(&fixture).stage(Vec::new()).await.unwrap_err();
        assert!(matches!(err, StageError::NoFiles));
    }
}
