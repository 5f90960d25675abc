//! Case-manager partition keys and the output filename convention.
//!
//! `key_from_name` is used both when reading roster sources and when matching
//! previously produced workbooks back to a key, so it must never change shape.

use crate::defaults::{DEFAULT_CASE_MANAGER_PREFIX, DEFAULT_CASE_MANAGER_SUFFIX};
use serde::{Deserialize, Serialize};

/// Reserved key for the "all case managers" partition.
pub const ALL_KEY: &str = "__all__";
/// Reserved key for rows with no (or an unusable) case manager.
pub const BLANK_KEY: &str = "__blank__";

pub const ALL_LABEL: &str = "All case managers";
pub const BLANK_LABEL: &str = "Blank / unassigned case manager";

/// Derive the filesystem- and query-safe key for a free-text name.
///
/// Trim, collapse internal whitespace, drop commas, turn spaces into
/// underscores, then strip anything outside `[A-Za-z0-9_]`. An empty result
/// maps to [`BLANK_KEY`].
pub fn key_from_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let key: String = collapsed
        .chars()
        .filter(|ch| *ch != ',')
        .map(|ch| if ch == ' ' { '_' } else { ch })
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .collect();

    if key.is_empty() {
        BLANK_KEY.to_string()
    } else {
        key
    }
}

/// Returns true if the value could have been produced by [`key_from_name`].
pub fn is_valid_key(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Display label for a key recovered from a filename (no roster name known).
pub fn label_from_key(key: &str) -> String {
    match key {
        ALL_KEY => ALL_LABEL.to_string(),
        BLANK_KEY => BLANK_LABEL.to_string(),
        other => other
            .split('_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// `<prefix><key><suffix>` naming convention for per-case-manager workbooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseManagerNaming {
    pub prefix: String,
    pub suffix: String,
}

impl Default for CaseManagerNaming {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CASE_MANAGER_PREFIX.to_string(),
            suffix: DEFAULT_CASE_MANAGER_SUFFIX.to_string(),
        }
    }
}

impl CaseManagerNaming {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn filename_for(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix, key, self.suffix)
    }

    /// Recover the key from a filename following the convention.
    ///
    /// Returns `None` when the name does not match or the middle part is not a
    /// valid key.
    pub fn key_from_filename(&self, filename: &str) -> Option<String> {
        let middle = filename
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if is_valid_key(middle) {
            Some(middle.to_string())
        } else {
            None
        }
    }
}
