//! Extension allow-list and classification into batch subdirectories.

use auditflow_protocol::FileKind;
use auditflow_security::split_extension;
use serde::{Deserialize, Serialize};

/// Filename fragments that mark a file as roster-like tabular data.
pub const DEFAULT_ROSTER_HINTS: &[&str] = &["roster", "crosswalk", "export", "caseload", "census"];

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "rtf", "odt"];
const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv", "xlsx", "xls", "xlsm", "ods"];
const OTHER_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "xml", "html", "htm", "png", "jpg", "jpeg", "tif", "tiff", "gif",
    "heic", "zip", "eml", "msg",
];

/// Allow-list plus keyword hints. Extensions are compared lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classifier {
    pub document_extensions: Vec<String>,
    pub tabular_extensions: Vec<String>,
    pub other_extensions: Vec<String>,
    pub roster_hints: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            document_extensions: owned(DOCUMENT_EXTENSIONS),
            tabular_extensions: owned(TABULAR_EXTENSIONS),
            other_extensions: owned(OTHER_EXTENSIONS),
            roster_hints: owned(DEFAULT_ROSTER_HINTS),
        }
    }
}

impl Classifier {
    /// Lowercase extension of `name`, if any.
    pub fn extension_of(name: &str) -> Option<String> {
        split_extension(name).1.map(|ext| ext.to_ascii_lowercase())
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        Self::extension_of(name).is_some_and(|ext| {
            contains(&self.document_extensions, &ext)
                || contains(&self.tabular_extensions, &ext)
                || contains(&self.other_extensions, &ext)
        })
    }

    /// Document extensions win over roster hints; `roster.pdf` is a document.
    pub fn classify(&self, name: &str) -> FileKind {
        let ext = Self::extension_of(name).unwrap_or_default();
        if contains(&self.document_extensions, &ext) {
            FileKind::Document
        } else if contains(&self.tabular_extensions, &ext) || self.has_roster_hint(name) {
            FileKind::TabularData
        } else {
            FileKind::Other
        }
    }

    pub fn has_roster_hint(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.roster_hints
            .iter()
            .any(|hint| !hint.is_empty() && lower.contains(&hint.to_ascii_lowercase()))
    }

    /// A tabular file whose name suggests a case-manager roster.
    pub fn is_roster_file(&self, name: &str) -> bool {
        let ext = Self::extension_of(name).unwrap_or_default();
        contains(&self.tabular_extensions, &ext) && self.has_roster_hint(name)
    }
}

fn contains(list: &[String], ext: &str) -> bool {
    !ext.is_empty() && list.iter().any(|item| item.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_and_hint() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("a.pdf"), FileKind::Document);
        assert_eq!(classifier.classify("roster.csv"), FileKind::TabularData);
        assert_eq!(classifier.classify("notes.txt"), FileKind::Other);
        assert_eq!(classifier.classify("Caseload Export.json"), FileKind::TabularData);
        assert_eq!(classifier.classify("Roster.PDF"), FileKind::Document);
        assert_eq!(classifier.classify("scan.TIFF"), FileKind::Other);
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let classifier = Classifier::default();
        assert!(classifier.is_allowed("Report.DOCX"));
        assert!(!classifier.is_allowed("payload.exe"));
        assert!(!classifier.is_allowed("README"));
        assert!(!classifier.is_allowed("archive."));
    }

    #[test]
    fn roster_files_need_tabular_extension() {
        let classifier = Classifier::default();
        assert!(classifier.is_roster_file("CM_Roster_2026.xlsx"));
        assert!(classifier.is_roster_file("crosswalk.tsv"));
        assert!(!classifier.is_roster_file("roster_notes.txt"));
        assert!(!classifier.is_roster_file("claims.csv"));
    }
}
