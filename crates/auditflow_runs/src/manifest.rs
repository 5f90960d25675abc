//! Lenient view of a manifest as the analyzer writes it.
//!
//! Every field is optional and unknown fields are ignored; older analyzers
//! omit `selection` and `finishedAt`, and some write snake_case keys.

use auditflow_protocol::types::{RunOutputs, RunScope, RunSelection, RunStatus};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestFile {
    #[serde(alias = "run_id")]
    pub run_id: Option<String>,
    pub module: Option<String>,
    pub scope: Option<String>,
    pub selection: Option<RunSelection>,
    pub status: Option<String>,
    #[serde(alias = "started_at")]
    pub started_at: Option<String>,
    #[serde(alias = "finished_at")]
    pub finished_at: Option<String>,
    pub outputs: Option<RunOutputs>,
    pub error: Option<String>,
}

impl ManifestFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Unknown or missing status reads as running: the analyzer has not
    /// declared an outcome.
    pub fn status(&self) -> RunStatus {
        match self.status.as_deref() {
            None => RunStatus::Running,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(status = raw, "Unrecognized manifest status; treating as running");
                RunStatus::Running
            }),
        }
    }

    pub fn scope(&self) -> RunScope {
        self.scope
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.as_deref().and_then(parse_timestamp)
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at.as_deref().and_then(parse_timestamp)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let manifest = ManifestFile::parse(
            br#"{
                "runId": "r1", "module": "intake_audit", "scope": "case_manager",
                "selection": {"caseManagerKey": "Jane_R", "caseManagerName": "Jane R"},
                "status": "done", "startedAt": "2026-10-18T10:15:00Z",
                "finishedAt": "2026-10-18T10:21:42+00:00",
                "outputs": {"xlsx": "audit_Jane_R.xlsx"}, "extra": [1, 2]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.status(), RunStatus::Done);
        assert_eq!(manifest.scope(), RunScope::CaseManager);
        assert!(manifest.started_at().is_some());
        assert!(manifest.finished_at().is_some());
        assert_eq!(
            manifest.selection.unwrap().case_manager_key.as_deref(),
            Some("Jane_R")
        );
    }

    #[test]
    fn tolerates_sparse_and_legacy_manifests() {
        let manifest =
            ManifestFile::parse(br#"{"run_id": "r1", "status": "finished?", "started_at": "bad"}"#)
                .unwrap();
        assert_eq!(manifest.run_id.as_deref(), Some("r1"));
        assert_eq!(manifest.status(), RunStatus::Running);
        assert_eq!(manifest.scope(), RunScope::All);
        assert!(manifest.started_at().is_none());

        assert!(ManifestFile::parse(b"{").is_err());
    }
}
