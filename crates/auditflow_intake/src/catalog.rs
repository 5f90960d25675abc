//! Read access to staged batches.

use crate::classify::Classifier;
use crate::error::{Result, StageError};
use auditflow_ids::BatchId;
use auditflow_protocol::types::{BatchManifest, FileKind, StagedFile};
use auditflow_protocol::StorageRoot;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// A committed batch and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatch {
    pub batch_id: BatchId,
    pub root: PathBuf,
    pub manifest: BatchManifest,
}

impl StagedBatch {
    pub fn path_of(&self, file: &StagedFile) -> PathBuf {
        self.root.join(&file.relative_path)
    }

    /// Tabular files whose names suggest a roster, in upload order.
    pub fn roster_files<'a>(
        &'a self,
        classifier: &'a Classifier,
    ) -> impl Iterator<Item = &'a StagedFile> + 'a {
        self.manifest
            .files_of_kind(FileKind::TabularData)
            .filter(move |file| classifier.is_roster_file(&file.saved_name))
    }
}

#[derive(Debug, Clone)]
pub struct BatchCatalog {
    storage: StorageRoot,
}

impl BatchCatalog {
    pub fn new(storage: StorageRoot) -> Self {
        Self { storage }
    }

    /// Load a batch by id; the id must be a UUID.
    pub fn load(&self, batch_id: &str) -> Result<StagedBatch> {
        let batch_id = BatchId::parse(batch_id)?;
        let path = self.storage.batch_manifest(&batch_id);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StageError::NotFound(batch_id.to_string()))
            }
            Err(err) => return Err(StageError::io(path, err)),
        };
        let manifest: BatchManifest = serde_json::from_slice(&body)?;
        Ok(StagedBatch {
            root: self.storage.batch_dir(&batch_id),
            batch_id,
            manifest,
        })
    }

    /// The batch whose `batch.json` was modified most recently.
    pub fn latest(&self) -> Result<Option<StagedBatch>> {
        let uploads = self.storage.uploads_dir();
        let entries = match fs::read_dir(&uploads) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StageError::io(uploads, err)),
        };

        let mut newest: Option<(SystemTime, BatchId)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(batch_id) = BatchId::parse(&name) else {
                continue;
            };
            let modified = match fs::metadata(self.storage.batch_manifest(&batch_id))
                .and_then(|meta| meta.modified())
            {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
                newest = Some((modified, batch_id));
            }
        }

        match newest {
            Some((_, batch_id)) => {
                debug!(batch_id = %batch_id, "Newest batch");
                self.load(batch_id.as_str()).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditflow_test_utils::{set_age, StorageFixture};

    #[test]
    fn load_rejects_non_uuid_ids() {
        let fixture = StorageFixture::new();
        let catalog = BatchCatalog::new(fixture.storage().clone());
        assert!(matches!(
            catalog.load("../../etc"),
            Err(StageError::InvalidBatchId(_))
        ));
        assert!(matches!(
            catalog.load("6f1c1f4e-5c55-4a57-9d1c-9a4c1f1f0b11"),
            Err(StageError::NotFound(_))
        ));
    }

    #[test]
    fn latest_uses_manifest_mtime() {
        let fixture = StorageFixture::new();
        let older = fixture.write_batch(&[(FileKind::TabularData, "roster.csv", b"cm\nA\n")]);
        let newer = fixture.write_batch(&[(FileKind::Other, "notes.txt", b"x")]);
        set_age(&fixture.batch_manifest_path(&older.batch_id), 10);
        set_age(&fixture.batch_manifest_path(&newer.batch_id), 3600);

        let catalog = BatchCatalog::new(fixture.storage().clone());
        let latest = catalog.latest().unwrap().unwrap();
        assert_eq!(latest.manifest.batch_id, older.batch_id);

        let classifier = Classifier::default();
        let rosters: Vec<_> = latest.roster_files(&classifier).collect();
        assert_eq!(rosters.len(), 1);
        assert!(latest.path_of(rosters[0]).is_file());
    }

    #[test]
    fn latest_on_empty_storage() {
        let fixture = StorageFixture::new();
        let catalog = BatchCatalog::new(fixture.storage().clone());
        assert!(catalog.latest().unwrap().is_none());
    }
}
