//! RunManifestStore: scans the runs area and reconciles what it finds.

use crate::error::RunStoreError;
use crate::manifest::ManifestFile;
use crate::state::{reconcile, RunSnapshot, TierSnapshot};
use auditflow_ids::RunId;
use auditflow_protocol::defaults::LOG_STUB_MESSAGE;
use auditflow_protocol::types::RunRecord;
use auditflow_protocol::StorageRoot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, RunStoreError>;

/// Read-only access to run manifests and logs. Never writes a manifest.
#[derive(Debug, Clone)]
pub struct RunManifestStore {
    storage: StorageRoot,
}

impl RunManifestStore {
    pub fn new(storage: StorageRoot) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageRoot {
        &self.storage
    }

    /// Current view of a run. The id is validated before any path is built.
    pub fn get(&self, run_id: &str) -> Result<RunRecord> {
        let run_id = RunId::parse(run_id)?;
        let snapshot = self.snapshot(&run_id)?;
        reconcile(&run_id, snapshot).ok_or_else(|| RunStoreError::NotFound(run_id.to_string()))
    }

    /// Gather every tier for `run_id` from disk.
    pub fn snapshot(&self, run_id: &RunId) -> Result<RunSnapshot> {
        let manifest = self.read_tier(&self.storage.run_manifest(run_id))?;
        let legacy_path = self.storage.legacy_manifest(run_id);
        let legacy = if legacy_path.is_file() {
            self.read_tier(&legacy_path)?
        } else {
            None
        };
        let run_dir = self.storage.run_dir(run_id);
        let run_dir_modified = if run_dir.is_dir() {
            modified_at(&run_dir)
        } else {
            None
        };
        Ok(RunSnapshot {
            manifest,
            legacy,
            run_dir_modified,
        })
    }

    /// A manifest that is missing or cannot be parsed yet counts as absent.
    fn read_tier(&self, path: &Path) -> Result<Option<TierSnapshot>> {
        let bytes = match read_optional(path)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        match ManifestFile::parse(&bytes) {
            Ok(manifest) => Ok(Some(TierSnapshot {
                manifest,
                modified: modified_at(path),
            })),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Unreadable manifest; ignoring");
                Ok(None)
            }
        }
    }

    /// Log text for a run.
    ///
    /// `run.log` first, then the legacy `runs/<runId>.log`. With no log but a
    /// manifest, a stub line followed by the raw manifest is returned.
    pub fn get_log(&self, run_id: &str) -> Result<String> {
        let run_id = RunId::parse(run_id)?;

        for path in [
            self.storage.run_log(&run_id),
            self.storage.legacy_log(&run_id),
        ] {
            if let Some(bytes) = read_optional(&path)? {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
        }

        let legacy = self.storage.legacy_manifest(&run_id);
        for path in [self.storage.run_manifest(&run_id), legacy] {
            if !path.is_file() {
                continue;
            }
            if let Some(bytes) = read_optional(&path)? {
                debug!(run_id = %run_id, "No log yet; returning manifest");
                return Ok(format!(
                    "{}\n{}",
                    LOG_STUB_MESSAGE,
                    String::from_utf8_lossy(&bytes)
                ));
            }
        }

        Err(RunStoreError::NotFound(run_id.to_string()))
    }

    /// Last `lines` lines of the run's log.
    pub fn log_tail(&self, run_id: &str, lines: usize) -> Result<String> {
        let log = self.get_log(run_id)?;
        Ok(tail_lines(&log, lines))
    }

    /// Every run id in the runs area, newest first.
    pub fn list(&self) -> Result<Vec<RunId>> {
        let runs_dir = self.storage.runs_dir();
        let entries = match fs::read_dir(&runs_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RunStoreError::io(runs_dir, err)),
        };

        let mut found: HashMap<RunId, SystemTime> = HashMap::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(run_id) = RunId::parse(&name) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found
                .entry(run_id)
                .and_modify(|existing| *existing = (*existing).max(modified))
                .or_insert(modified);
        }

        let mut runs: Vec<(RunId, SystemTime)> = found.into_iter().collect();
        runs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        Ok(runs.into_iter().map(|(run_id, _)| run_id).collect())
    }

    /// `runs/<runId>/artifacts` for every listed run that has one.
    pub fn artifact_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .list()?
            .iter()
            .map(|run_id| self.storage.run_artifacts_dir(run_id))
            .filter(|dir| dir.is_dir())
            .collect())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        // `runs/<runId>` is a directory in the current layout
        Err(_) if path.is_dir() => Ok(None),
        Err(err) => Err(RunStoreError::io(path, err)),
    }
}

pub(crate) fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn tail_lines(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("a", 5), "a");
        assert_eq!(tail_lines("", 3), "");
    }
}
