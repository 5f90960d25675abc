//! Three-tier run reconciliation, free of any I/O.
//!
//! Tiers, first present wins:
//! 1. structured manifest `runs/<runId>/manifest.json`
//! 2. legacy flat manifest `runs/<runId>`
//! 3. bare run directory, read as an implicit `running` record
//!
//! A manifest's own status is never overridden. Outputs of a running
//! manifest are dropped: they are only meaningful once the run is terminal.

use crate::manifest::ManifestFile;
use auditflow_ids::RunId;
use auditflow_protocol::types::{RecordSource, RunOutputs, RunRecord, RunStatus};
use chrono::{DateTime, Utc};

/// A parsed manifest plus the modification time of the file it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierSnapshot {
    pub manifest: ManifestFile,
    pub modified: Option<DateTime<Utc>>,
}

/// What the store found on disk for one run id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSnapshot {
    pub manifest: Option<TierSnapshot>,
    pub legacy: Option<TierSnapshot>,
    /// Modification time of `runs/<runId>/` if the directory exists.
    pub run_dir_modified: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    pub fn is_empty(&self) -> bool {
        self.manifest.is_none() && self.legacy.is_none() && self.run_dir_modified.is_none()
    }
}

/// Resolve a snapshot into a record, or `None` when nothing exists.
pub fn reconcile(run_id: &RunId, snapshot: RunSnapshot) -> Option<RunRecord> {
    if let Some(tier) = snapshot.manifest {
        let fallback = tier.modified.or(snapshot.run_dir_modified);
        return Some(from_manifest(run_id, tier.manifest, RecordSource::Manifest, fallback));
    }
    if let Some(tier) = snapshot.legacy {
        let fallback = tier.modified;
        return Some(from_manifest(run_id, tier.manifest, RecordSource::Legacy, fallback));
    }
    snapshot
        .run_dir_modified
        .map(|started_at| placeholder(run_id, started_at))
}

fn from_manifest(
    run_id: &RunId,
    manifest: ManifestFile,
    source: RecordSource,
    fallback_started: Option<DateTime<Utc>>,
) -> RunRecord {
    let status = manifest.status();
    let scope = manifest.scope();
    let started_at = manifest
        .started_at()
        .or(fallback_started)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let finished_at = if status.is_terminal() {
        manifest.finished_at()
    } else {
        None
    };
    let outputs = if status.is_terminal() {
        manifest.outputs.unwrap_or_default()
    } else {
        RunOutputs::default()
    };

    RunRecord {
        run_id: run_id.to_string(),
        module: manifest
            .module
            .filter(|module| !module.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        scope,
        selection: manifest.selection.unwrap_or_default(),
        status,
        started_at,
        finished_at,
        outputs,
        error: manifest.error,
        source,
    }
}

fn placeholder(run_id: &RunId, started_at: DateTime<Utc>) -> RunRecord {
    RunRecord {
        run_id: run_id.to_string(),
        module: "unknown".to_string(),
        scope: Default::default(),
        selection: Default::default(),
        status: RunStatus::Running,
        started_at,
        finished_at: None,
        outputs: RunOutputs::default(),
        error: None,
        source: RecordSource::Placeholder,
    }
}
