//! Canonical enums and on-disk records.
//!
//! Field names serialize in camelCase because the analyzer reads and writes
//! the same JSON documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Run lifecycle
// ============================================================================

/// Status of a run. Only `Running -> Done` and `Running -> Error` are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Running,
    Done,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "done" => Ok(RunStatus::Done),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("Unknown run status: '{}'", other)),
        }
    }
}

/// Whether a run covers every record or one case-manager partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    #[default]
    All,
    CaseManager,
}

impl RunScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunScope::All => "all",
            RunScope::CaseManager => "case_manager",
        }
    }
}

impl fmt::Display for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(RunScope::All),
            "case_manager" | "cm" => Ok(RunScope::CaseManager),
            other => Err(format!("Unknown scope: '{}' (expected all or case_manager)", other)),
        }
    }
}

/// Which tier of manifest resolution produced a [`RunRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// `runs/<runId>/manifest.json`
    #[default]
    Manifest,
    /// Flat `runs/<runId>` file
    Legacy,
    /// Run directory without any manifest yet
    Placeholder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSelection {
    pub case_manager_key: Option<String>,
    pub case_manager_name: Option<String>,
    pub batch_id: Option<String>,
    pub cache_hit: bool,
}

/// Output locations recorded by the analyzer. Paths are relative to the
/// shared output root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOutputs {
    pub xlsx: Option<String>,
    pub xlsx_list: Vec<String>,
    pub pdf: Option<String>,
    pub sheet_url: Option<String>,
    pub form_url: Option<String>,
}

impl RunOutputs {
    pub fn is_empty(&self) -> bool {
        self.xlsx.is_none()
            && self.xlsx_list.is_empty()
            && self.pdf.is_none()
            && self.sheet_url.is_none()
            && self.form_url.is_none()
    }
}

/// Reconciled view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub module: String,
    pub scope: RunScope,
    pub selection: RunSelection,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outputs: RunOutputs,
    pub error: Option<String>,
    pub source: RecordSource,
}

impl RunRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ============================================================================
// Upload batches
// ============================================================================

/// Classified subdirectory of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "document")]
    Document,
    #[serde(rename = "tabular-data")]
    TabularData,
    #[serde(rename = "other")]
    Other,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Document, FileKind::TabularData, FileKind::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Document => "document",
            FileKind::TabularData => "tabular-data",
            FileKind::Other => "other",
        }
    }

    /// Directory name inside the batch root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            FileKind::Document => "documents",
            FileKind::TabularData => "tabular-data",
            FileKind::Other => "other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFile {
    pub original_name: String,
    pub saved_name: String,
    pub kind: FileKind,
    /// Relative to the batch root, always `/`-separated.
    pub relative_path: String,
    pub byte_size: u64,
    pub sha256: String,
}

/// Contents of `batch.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchManifest {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub total_bytes: u64,
    pub files: Vec<StagedFile>,
}

impl BatchManifest {
    pub fn files_of_kind(&self, kind: FileKind) -> impl Iterator<Item = &StagedFile> {
        self.files.iter().filter(move |file| file.kind == kind)
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// Output format a caller may request for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    Spreadsheet,
    Document,
    ExternalSheet,
    ExternalForm,
}

impl ArtifactFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::Spreadsheet => "spreadsheet",
            ArtifactFormat::Document => "document",
            ArtifactFormat::ExternalSheet => "external-sheet",
            ArtifactFormat::ExternalForm => "external-form",
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ArtifactFormat::ExternalSheet | ArtifactFormat::ExternalForm)
    }

    /// Lowercase file extensions accepted for file formats; empty for links.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ArtifactFormat::Spreadsheet => &["xlsx", "xlsm", "xls"],
            ArtifactFormat::Document => &["pdf"],
            ArtifactFormat::ExternalSheet | ArtifactFormat::ExternalForm => &[],
        }
    }

    pub fn content_type_for(extension: &str) -> &'static str {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "xlsm" => "application/vnd.ms-excel.sheet.macroEnabled.12",
            "xls" => "application/vnd.ms-excel",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spreadsheet" | "xlsx" => Ok(ArtifactFormat::Spreadsheet),
            "document" | "pdf" => Ok(ArtifactFormat::Document),
            "external-sheet" | "sheet" => Ok(ArtifactFormat::ExternalSheet),
            "external-form" | "form" => Ok(ArtifactFormat::ExternalForm),
            other => Err(format!(
                "Unknown artifact format: '{}' (expected spreadsheet, document, external-sheet or external-form)",
                other
            )),
        }
    }
}
