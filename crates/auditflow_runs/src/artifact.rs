//! ArtifactResolver: run id + format -> contained file or external link.
//!
//! File formats look in the run's own `artifacts/` directory first, then at
//! the paths recorded in the manifest (relative to the shared output root).
//! Every candidate goes through [`resolve_contained`]; an escape is fatal.

use crate::error::ArtifactError;
use crate::store::{modified_at, RunManifestStore};
use auditflow_ids::RunId;
use auditflow_protocol::types::{ArtifactFormat, RunOutputs, RunRecord, RunStatus};
use auditflow_security::{header_safe_filename, resolve_contained, split_extension, ContainmentError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, ArtifactError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    RunArtifacts,
    Manifest,
}

/// A file ready to stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub content_type: &'static str,
    /// Header-safe basename for `Content-Disposition`.
    pub filename: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub origin: ArtifactOrigin,
}

impl ResolvedArtifact {
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    fn from_path(path: PathBuf, origin: ArtifactOrigin) -> Result<Self> {
        let meta = fs::metadata(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = split_extension(&basename).1.unwrap_or_default();
        Ok(Self {
            content_type: ArtifactFormat::content_type_for(extension),
            filename: header_safe_filename(&basename),
            size: meta.len(),
            modified: modified_at(&path),
            origin,
            path,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactResponse {
    File(ResolvedArtifact),
    Redirect { url: String },
}

#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    store: RunManifestStore,
}

impl ArtifactResolver {
    pub fn new(store: RunManifestStore) -> Self {
        Self { store }
    }

    /// Parse `format` (including its aliases) and resolve.
    pub fn resolve_named(
        &self,
        run_id: &str,
        format: &str,
        file_hint: Option<&str>,
    ) -> Result<ArtifactResponse> {
        let format: ArtifactFormat = format.parse().map_err(ArtifactError::UnknownFormat)?;
        self.resolve(run_id, format, file_hint)
    }

    pub fn resolve(
        &self,
        run_id: &str,
        format: ArtifactFormat,
        file_hint: Option<&str>,
    ) -> Result<ArtifactResponse> {
        let run_id = RunId::parse(run_id)?;
        let record = self.store.get(run_id.as_str())?;

        if format.is_external() {
            return external_link(&record, format).map(|url| ArtifactResponse::Redirect { url });
        }

        if let Some(path) = self.from_run_artifacts(&run_id, format, file_hint)? {
            debug!(run_id = %run_id, path = %path.display(), "Artifact from run directory");
            return ResolvedArtifact::from_path(path, ArtifactOrigin::RunArtifacts)
                .map(ArtifactResponse::File);
        }

        if let Some(path) = self.from_manifest(&record.outputs, format, file_hint)? {
            debug!(run_id = %run_id, path = %path.display(), "Artifact from manifest outputs");
            return ResolvedArtifact::from_path(path, ArtifactOrigin::Manifest)
                .map(ArtifactResponse::File);
        }

        let run_id = run_id.to_string();
        match record.status {
            RunStatus::Running => Err(ArtifactError::StillRunning { run_id, format }),
            RunStatus::Done | RunStatus::Error => Err(ArtifactError::NoArtifact { run_id, format }),
        }
    }

    /// Hint match by basename (case-insensitive), else the newest match.
    fn from_run_artifacts(
        &self,
        run_id: &RunId,
        format: ArtifactFormat,
        file_hint: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let dir = self.store.storage().run_artifacts_dir(run_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ArtifactError::Io { path: dir, source }),
        };

        let mut matches: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !has_extension(&name, format) {
                continue;
            }
            let path = match resolve_contained(&dir, &name) {
                Ok(path) => path,
                Err(ContainmentError::Missing(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            if path.is_file() {
                matches.push((name, path));
            }
        }

        if let Some(hint) = file_hint.map(basename) {
            if let Some((_, path)) = matches.iter().find(|(name, _)| name.eq_ignore_ascii_case(hint)) {
                return Ok(Some(path.clone()));
            }
        }

        Ok(matches
            .into_iter()
            .max_by(|(a_name, a), (b_name, b)| {
                modified_at(a)
                    .cmp(&modified_at(b))
                    .then_with(|| b_name.cmp(a_name))
            })
            .map(|(_, path)| path))
    }

    fn from_manifest(
        &self,
        outputs: &RunOutputs,
        format: ArtifactFormat,
        file_hint: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let root = self.store.storage().outputs_dir();
        for candidate in manifest_candidates(outputs, format, file_hint) {
            match resolve_contained(root, candidate) {
                Ok(path) if path.is_file() => return Ok(Some(path)),
                Ok(_) => continue,
                Err(ContainmentError::Missing(_)) => continue,
                Err(ContainmentError::RootUnavailable { root, .. }) => {
                    warn!(root = %root.display(), "Output root unavailable");
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }
}

/// Spreadsheets: hint match in `xlsxList`, then `xlsx`, then the rest of
/// `xlsxList`. Documents: `pdf`.
fn manifest_candidates<'a>(
    outputs: &'a RunOutputs,
    format: ArtifactFormat,
    file_hint: Option<&str>,
) -> Vec<&'a str> {
    let mut candidates: Vec<&str> = Vec::new();
    let mut push = |candidate: &'a str| {
        if !candidate.trim().is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    match format {
        ArtifactFormat::Spreadsheet => {
            if let Some(hint) = file_hint.map(basename) {
                outputs
                    .xlsx_list
                    .iter()
                    .filter(|path| basename(path).eq_ignore_ascii_case(hint))
                    .for_each(|path| push(path));
            }
            if let Some(xlsx) = outputs.xlsx.as_deref() {
                push(xlsx);
            }
            outputs.xlsx_list.iter().for_each(|path| push(path));
        }
        ArtifactFormat::Document => {
            if let Some(pdf) = outputs.pdf.as_deref() {
                push(pdf);
            }
        }
        ArtifactFormat::ExternalSheet | ArtifactFormat::ExternalForm => {}
    }
    candidates
}

fn external_link(record: &RunRecord, format: ArtifactFormat) -> Result<String> {
    let raw = match format {
        ArtifactFormat::ExternalSheet => record.outputs.sheet_url.as_deref(),
        ArtifactFormat::ExternalForm => record.outputs.form_url.as_deref(),
        _ => None,
    };
    let not_configured = || ArtifactError::NotConfigured {
        run_id: record.run_id.clone(),
        format,
    };

    let raw = raw.map(str::trim).filter(|url| !url.is_empty()).ok_or_else(not_configured)?;
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.to_string()),
        _ => {
            warn!(run_id = %record.run_id, url = raw, "Ignoring non-http link in manifest");
            Err(not_configured())
        }
    }
}

fn has_extension(name: &str, format: ArtifactFormat) -> bool {
    split_extension(name)
        .1
        .is_some_and(|ext| format.extensions().iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spreadsheet_candidates_prefer_hint_then_primary() {
        let outputs = RunOutputs {
            xlsx: Some("audit___all__.xlsx".into()),
            xlsx_list: vec![
                "by_cm/audit_Jane_R.xlsx".into(),
                "audit___all__.xlsx".into(),
                "by_cm/audit_Bob.xlsx".into(),
            ],
            ..Default::default()
        };
        assert_eq!(
            manifest_candidates(&outputs, ArtifactFormat::Spreadsheet, Some("AUDIT_bob.xlsx")),
            vec!["by_cm/audit_Bob.xlsx", "audit___all__.xlsx", "by_cm/audit_Jane_R.xlsx"]
        );
        assert_eq!(
            manifest_candidates(&outputs, ArtifactFormat::Spreadsheet, None),
            vec!["audit___all__.xlsx", "by_cm/audit_Jane_R.xlsx", "by_cm/audit_Bob.xlsx"]
        );
        assert!(manifest_candidates(&outputs, ArtifactFormat::Document, None).is_empty());
    }

    #[test]
    fn extension_matching() {
        assert!(has_extension("a.XLSM", ArtifactFormat::Spreadsheet));
        assert!(!has_extension("a.pdf", ArtifactFormat::Spreadsheet));
        assert!(has_extension("report.pdf", ArtifactFormat::Document));
        assert!(!has_extension("pdf", ArtifactFormat::Document));
    }
}
