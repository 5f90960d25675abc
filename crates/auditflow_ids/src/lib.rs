//! Identifier wrappers for upload batches and analyzer runs.
//!
//! Both ids end up as directory names under the storage root, so parsing is
//! the only way to construct one from caller input.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Run ids are produced by the analyzer launcher or by older tooling, so they
/// are not UUIDs. They must still be a single safe path component.
static RUN_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("valid run id regex"));

/// Error returned when parsing an identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

/// Identifier of an immutable upload batch (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        let parsed = Uuid::parse_str(value.trim())
            .map_err(|e| IdParseError::new(format!("Invalid batch ID '{}': {}", value, e)))?;
        // Canonical hyphenated lowercase so the directory name is stable.
        Ok(Self(parsed.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of one analyzer run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh, time-sortable run id: `YYYYMMDD-HHMMSS-<8 hex>`.
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", stamp, &suffix[..8]))
    }

    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        if RUN_ID_PATTERN.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(IdParseError::new(format!(
                "Invalid run ID '{}': expected 1-128 characters of [A-Za-z0-9_-], starting with a letter or digit",
                value.escape_default()
            )))
        }
    }

    pub fn is_valid(value: &str) -> bool {
        RUN_ID_PATTERN.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_id_traits {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_id_traits!(BatchId);
impl_id_traits!(RunId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_round_trips_through_parse() {
        let id = BatchId::new();
        assert_eq!(BatchId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn batch_id_rejects_paths() {
        assert!(BatchId::parse("../uploads").is_err());
        assert!(BatchId::parse("").is_err());
    }

    #[test]
    fn batch_id_is_canonicalized() {
        let upper = "3F2504E0-4F89-41D3-9A0C-0305E82C3301";
        let id = BatchId::parse(upper).unwrap();
        assert_eq!(id.as_str(), "3f2504e0-4f89-41d3-9a0c-0305e82c3301");
    }

    #[test]
    fn run_id_accepts_common_shapes() {
        for value in ["20261018-101500-3fa2c1d9", "run_42", "A", "legacy-run-7"] {
            assert!(RunId::parse(value).is_ok(), "{value} should be valid");
        }
    }

    #[test]
    fn run_id_rejects_traversal_and_separators() {
        for value in [
            "",
            "..",
            "../etc",
            "a/b",
            "a\\b",
            "_leading",
            "-leading",
            "has space",
            "dot.name",
            "nul\0byte",
        ] {
            assert!(RunId::parse(value).is_err(), "{value:?} should be rejected");
        }
        assert!(RunId::parse(&"x".repeat(129)).is_err());
    }

    #[test]
    fn generated_run_ids_are_valid_and_distinct() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert!(RunId::is_valid(a.as_str()));
        assert_ne!(a, b);
    }
}
