//! Read-only SQL guard utilities.
//!
//! Roster lookups come from configuration, either as a table/column pair or
//! as a custom query. Both are checked here before reaching SQLite.

use thiserror::Error;

const ALLOWED_PREFIXES: &[&str] = &["SELECT", "WITH"];
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "COPY", "ATTACH",
    "DETACH", "INSTALL", "LOAD", "PRAGMA", "VACUUM", "REPLACE",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlGuardError {
    #[error("Roster query is empty")]
    Empty,

    #[error("Roster query must start with SELECT or WITH")]
    NotSelect,

    #[error("Multiple statements are not allowed in a roster query")]
    MultipleStatements,

    #[error("Roster query contains forbidden keyword: {0}")]
    Forbidden(String),

    #[error("Invalid identifier '{0}': expected letters, digits and underscores")]
    InvalidIdentifier(String),
}

/// Validate that a SQL query is read-only.
pub fn validate_read_only(sql: &str) -> Result<(), SqlGuardError> {
    let code = mask_non_code(sql);
    if code.trim().is_empty() {
        return Err(SqlGuardError::Empty);
    }

    let body = code.trim_end().trim_end_matches(';');
    if body.contains(';') {
        return Err(SqlGuardError::MultipleStatements);
    }

    let words = keywords(body);
    match words.first() {
        Some(first) if ALLOWED_PREFIXES.contains(&first.as_str()) => {}
        _ => return Err(SqlGuardError::NotSelect),
    }
    if let Some(bad) = words
        .into_iter()
        .find(|word| FORBIDDEN_KEYWORDS.contains(&word.as_str()))
    {
        return Err(SqlGuardError::Forbidden(bad));
    }
    Ok(())
}

/// Validate a bare SQL identifier (table or column name) and return it quoted.
///
/// Only `[A-Za-z_][A-Za-z0-9_]*` is accepted, so quoting can never be escaped.
pub fn quote_identifier(name: &str) -> Result<String, SqlGuardError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_');
    if !valid_start || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(SqlGuardError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Wrap a validated roster query so at most `limit` rows come back.
///
/// The inner query sits on its own lines so a trailing `--` comment cannot
/// swallow the closing parenthesis.
pub fn apply_row_limit(sql: &str, limit: usize) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT * FROM (\n{}\n) AS _roster LIMIT {}", inner, limit)
}

/// Uppercased words made of `[A-Za-z0-9_]`, in order.
fn keywords(code: &str) -> Vec<String> {
    code.split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// Replace string literals, quoted identifiers and comments with spaces so
/// keyword and `;` checks only see executable SQL.
fn mask_non_code(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut state = Scan::Code;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        let next = chars.peek().copied();
        state = match (state, ch, next) {
            (Scan::Code, '-', Some('-')) => {
                chars.next();
                Scan::LineComment
            }
            (Scan::Code, '/', Some('*')) => {
                chars.next();
                Scan::BlockComment
            }
            (Scan::Code, '\'', _) => Scan::SingleQuoted,
            (Scan::Code, '"', _) => Scan::DoubleQuoted,
            (Scan::Code, _, _) => {
                out.push(ch);
                continue;
            }
            // Doubled quote is an escaped quote inside the literal.
            (Scan::SingleQuoted, '\'', Some('\'')) => {
                chars.next();
                Scan::SingleQuoted
            }
            (Scan::SingleQuoted, '\'', _) | (Scan::DoubleQuoted, '"', _) => Scan::Code,
            (Scan::LineComment, '\n', _) => Scan::Code,
            (Scan::BlockComment, '*', Some('/')) => {
                chars.next();
                Scan::Code
            }
            (current, _, _) => current,
        };
        out.push(' ');
    }
    out
}
