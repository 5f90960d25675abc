//! Filename hygiene for uploads and downloads.

const HOSTILE_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
const MAX_NAME_CHARS: usize = 180;
const FALLBACK_UPLOAD_NAME: &str = "upload";
const FALLBACK_DOWNLOAD_NAME: &str = "download";

/// Turn a client-supplied filename into a single safe path component.
///
/// Only the final path segment survives (both `/` and `\` count as
/// separators). Control and hostile characters become `_`, whitespace runs
/// collapse to one space, and leading dots are stripped so the result can
/// never be `..` or a hidden file.
pub fn sanitize_upload_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let replaced: String = base
        .chars()
        .map(|ch| {
            if ch.is_whitespace() {
                ' '
            } else if ch.is_control() || HOSTILE_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_start_matches(['.', ' '])
        .trim_end_matches(['.', ' ']);

    if trimmed.is_empty() {
        return FALLBACK_UPLOAD_NAME.to_string();
    }
    truncate_preserving_extension(trimmed, MAX_NAME_CHARS)
}

/// Split `name` into stem and extension (without the dot).
///
/// A leading dot does not start an extension, and `archive.` has none.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Filename safe to embed in a `Content-Disposition` header.
///
/// Uses the basename only and drops anything that could break out of the
/// quoted value or the header line.
pub fn header_safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|ch| (ch.is_ascii_graphic() || *ch == ' ') && !matches!(ch, '"' | '\\' | ';'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|ch| ch == '.') {
        FALLBACK_DOWNLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn truncate_preserving_extension(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    match ext {
        Some(ext) if ext.chars().count() < max_chars / 2 => {
            let keep = max_chars - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{}", stem.trim_end(), ext)
        }
        _ => name.chars().take(max_chars).collect(),
    }
}
