//! CaseManagerDirectory: merge roster sources and prior outputs into one
//! deduplicated catalog.

use crate::scan::{scan_outputs, OutputScan};
use crate::sources::RosterSource;
use auditflow_protocol::naming::{ALL_LABEL, BLANK_LABEL};
use auditflow_protocol::{key_from_name, label_from_key, CaseManagerNaming, ALL_KEY, BLANK_KEY};
use auditflow_runs::RunManifestStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Special,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseManagerOption {
    pub key: String,
    pub label: String,
    pub filename: String,
    pub kind: OptionKind,
    /// The conventional output workbook is already on disk.
    pub exists: bool,
}

/// Outcome of asking one roster source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttempt {
    pub source: String,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    /// Descriptor of the roster source that populated the catalog, if any.
    pub source: Option<String>,
    pub roster_count: usize,
    /// Keys that only came from existing output files.
    pub scanned_keys: Vec<String>,
    pub sources_tried: Vec<SourceAttempt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub special: Vec<CaseManagerOption>,
    pub normal: Vec<CaseManagerOption>,
    pub meta: CatalogMeta,
}

impl Catalog {
    pub fn find(&self, key: &str) -> Option<&CaseManagerOption> {
        self.special
            .iter()
            .chain(self.normal.iter())
            .find(|option| option.key == key)
    }
}

pub struct CaseManagerDirectory {
    sources: Vec<Box<dyn RosterSource>>,
    runs: RunManifestStore,
    naming: CaseManagerNaming,
}

impl CaseManagerDirectory {
    pub fn new(runs: RunManifestStore, naming: CaseManagerNaming) -> Self {
        Self {
            sources: Vec::new(),
            runs,
            naming,
        }
    }

    /// Append a source; earlier sources have priority.
    pub fn with_source(mut self, source: Box<dyn RosterSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn naming(&self) -> &CaseManagerNaming {
        &self.naming
    }

    pub async fn list(&self) -> Catalog {
        let mut meta = CatalogMeta::default();
        let mut labels: BTreeMap<String, String> = BTreeMap::new();

        for source in &self.sources {
            let descriptor = source.describe();
            match source.names().await {
                Ok(names) => {
                    let entries = roster_entries(&names);
                    meta.sources_tried.push(SourceAttempt {
                        source: descriptor.clone(),
                        entries: entries.len(),
                        error: None,
                    });
                    if !entries.is_empty() {
                        info!(source = %descriptor, entries = entries.len(), "Case manager roster loaded");
                        meta.source = Some(descriptor);
                        meta.roster_count = entries.len();
                        labels = entries;
                        break;
                    }
                    debug!(source = %descriptor, "Roster source empty");
                }
                Err(err) => {
                    warn!(source = %descriptor, error = %err, "Roster source failed");
                    meta.sources_tried.push(SourceAttempt {
                        source: descriptor,
                        entries: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let runs = self.runs.clone();
        let naming = self.naming.clone();
        let scan_task =
            tokio::task::spawn_blocking(move || scan_outputs(&scan_dirs(&runs), &naming));
        let scan = match scan_task.await {
            Ok(scan) => scan,
            Err(err) => {
                warn!(error = %err, "Output scan task failed");
                OutputScan::default()
            }
        };
        for key in &scan.keys {
            if is_reserved(key) || labels.contains_key(key) {
                continue;
            }
            labels.insert(key.clone(), label_from_key(key));
            meta.scanned_keys.push(key.clone());
        }

        let mut normal: Vec<CaseManagerOption> = labels
            .into_iter()
            .map(|(key, label)| self.option(key, label, OptionKind::Normal, &scan))
            .collect();
        normal.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.key.cmp(&b.key))
        });

        let special = vec![
            self.option(ALL_KEY.to_string(), ALL_LABEL.to_string(), OptionKind::Special, &scan),
            self.option(BLANK_KEY.to_string(), BLANK_LABEL.to_string(), OptionKind::Special, &scan),
        ];

        Catalog {
            special,
            normal,
            meta,
        }
    }

    fn option(&self, key: String, label: String, kind: OptionKind, scan: &OutputScan) -> CaseManagerOption {
        let filename = self.naming.filename_for(&key);
        CaseManagerOption {
            exists: scan.contains_file(&filename),
            key,
            label,
            filename,
            kind,
        }
    }
}

/// The flat output directory plus every run's `artifacts/`.
fn scan_dirs(runs: &RunManifestStore) -> Vec<PathBuf> {
    let mut dirs = vec![runs.storage().outputs_dir().to_path_buf()];
    match runs.artifact_dirs() {
        Ok(artifacts) => dirs.extend(artifacts),
        Err(err) => warn!(error = %err, "Could not list run artifact directories"),
    }
    dirs
}

fn is_reserved(key: &str) -> bool {
    key == ALL_KEY || key == BLANK_KEY
}

/// Key -> label for the usable names; the first spelling of a key wins.
fn roster_entries(names: &[String]) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for name in names {
        let key = key_from_name(name);
        if is_reserved(&key) {
            continue;
        }
        let label = name.split_whitespace().collect::<Vec<_>>().join(" ");
        entries.entry(key).or_insert(label);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_entries_dedupe_by_key() {
        let names: Vec<String> = ["Jane, R.", "Jane R", "  Bob   Smith ", "", "???", "__all__"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let entries = roster_entries(&names);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["Jane_R"], "Jane, R.");
        assert_eq!(entries["Bob_Smith"], "Bob Smith");
    }
}
