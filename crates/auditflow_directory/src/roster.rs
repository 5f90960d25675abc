//! Roster file parsing.

use crate::error::{DirectoryError, Result};
use csv::ReaderBuilder;
use tracing::warn;

/// Header names accepted for the case-manager column, compared
/// case-insensitively after trimming.
pub const HEADER_CANDIDATES: &[&str] = &[
    "case manager",
    "case_manager",
    "casemanager",
    "case manager name",
    "cm",
    "cm name",
    "assigned case manager",
];

/// Delimiter for a roster file name; `None` if the format is not delimited
/// text.
pub fn delimiter_for(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".tsv") {
        Some(b'\t')
    } else if lower.ends_with(".csv") {
        Some(b',')
    } else {
        None
    }
}

/// First candidate whose name is CSV or TSV, with its delimiter.
///
/// Other formats are skipped with a warning so an unreadable roster is not
/// silently ignored.
pub fn first_delimited<T, F>(
    candidates: impl IntoIterator<Item = T>,
    name_of: F,
) -> Option<(T, u8)>
where
    F: Fn(&T) -> &str,
{
    for candidate in candidates {
        let name = name_of(&candidate);
        match delimiter_for(name) {
            Some(delimiter) => return Some((candidate, delimiter)),
            None => warn!(
                file = %name,
                "Skipping roster candidate: only CSV and TSV rosters can be read"
            ),
        }
    }
    None
}

/// Parse a delimited roster and return the case-manager column, trimmed,
/// in file order. Empty cells are kept as empty strings.
pub fn parse_roster(bytes: &[u8], delimiter: u8, source_name: &str) -> Result<Vec<String>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let column = HEADER_CANDIDATES
        .iter()
        .find_map(|candidate| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(candidate))
        })
        .ok_or_else(|| DirectoryError::MissingColumn {
            source_name: source_name.to_string(),
            headers: headers.join(", "),
        })?;

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record?;
        names.push(record.get(column).unwrap_or("").trim().to_string());
    }
    Ok(names)
}

/// Parse by file name, rejecting formats other than CSV/TSV.
pub fn parse_named(name: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let delimiter =
        delimiter_for(name).ok_or_else(|| DirectoryError::UnsupportedFormat(name.to_string()))?;
    parse_roster(bytes, delimiter, name)
}
