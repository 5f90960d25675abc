//! Resolve-and-contain: the one place a stored path becomes a real path.
//!
//! A candidate is accepted only if it resolves to a location strictly inside
//! the canonical managed root. The comparison is component-wise
//! (`Path::starts_with`), so `outputs-evil/x` is never "inside" `outputs`.
//! Escapes are rejected whether or not the target exists.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ContainmentError {
    #[error("Path '{candidate}' escapes managed root {}", root.display())]
    Escape { root: PathBuf, candidate: String },

    #[error("Path not found under managed root: {}", .0.display())]
    Missing(PathBuf),

    #[error("Managed root {} is unavailable: {source}", root.display())]
    RootUnavailable {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to resolve {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ContainmentError {
    /// True for escapes; callers must never serve or retry these.
    pub fn is_violation(&self) -> bool {
        matches!(self, ContainmentError::Escape { .. })
    }
}

/// True if `relative` is a non-empty relative path that never climbs above its
/// starting point and ends strictly below it.
pub fn is_safe_relative(relative: &Path) -> bool {
    let mut depth: usize = 0;
    for component in relative.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return false,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
        }
    }
    depth > 0
}

/// Both arguments must already be canonical.
pub fn is_strictly_within(canonical_root: &Path, canonical_candidate: &Path) -> bool {
    canonical_candidate != canonical_root && canonical_candidate.starts_with(canonical_root)
}

/// Resolve `candidate` against `root` and require the result to exist strictly
/// inside `root`.
///
/// Relative candidates are joined onto the root; absolute candidates are
/// accepted only if they already point inside it. Symlinks are followed by
/// canonicalization and re-checked.
pub fn resolve_contained(
    root: &Path,
    candidate: impl AsRef<Path>,
) -> Result<PathBuf, ContainmentError> {
    let candidate = candidate.as_ref();
    let canonical_root = root
        .canonicalize()
        .map_err(|source| ContainmentError::RootUnavailable {
            root: root.to_path_buf(),
            source,
        })?;

    let joined = if candidate.is_absolute() {
        let normalized = normalize_lexically(candidate);
        let inside = is_strictly_within(&canonical_root, &normalized)
            || is_strictly_within(&normalize_lexically(root), &normalized);
        if !inside {
            return Err(escape(&canonical_root, candidate));
        }
        normalized
    } else {
        if !is_safe_relative(candidate) {
            return Err(escape(&canonical_root, candidate));
        }
        canonical_root.join(candidate)
    };

    let resolved = match joined.canonicalize() {
        Ok(path) => path,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ContainmentError::Missing(joined))
        }
        Err(source) => return Err(ContainmentError::Io { path: joined, source }),
    };

    if !is_strictly_within(&canonical_root, &resolved) {
        return Err(escape(&canonical_root, candidate));
    }
    Ok(resolved)
}

fn escape(canonical_root: &Path, candidate: &Path) -> ContainmentError {
    error!(
        root = %canonical_root.display(),
        candidate = %candidate.display(),
        "Rejected path outside managed root"
    );
    ContainmentError::Escape {
        root: canonical_root.to_path_buf(),
        candidate: candidate.display().to_string(),
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("outputs");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested/report.xlsx"), b"xlsx").unwrap();
        fs::create_dir_all(tmp.path().join("outputs-evil")).unwrap();
        fs::write(tmp.path().join("outputs-evil/x.xlsx"), b"evil").unwrap();
        fs::write(tmp.path().join("secret.txt"), b"secret").unwrap();
        (tmp, root)
    }

    #[test]
    fn accepts_paths_inside_root() {
        let (_tmp, root) = setup();
        let resolved = resolve_contained(&root, "nested/report.xlsx").unwrap();
        assert!(resolved.ends_with("nested/report.xlsx"));
        let resolved = resolve_contained(&root, "./nested/../nested/report.xlsx").unwrap();
        assert!(resolved.ends_with("nested/report.xlsx"));
    }

    #[test]
    fn rejects_parent_traversal_even_when_target_exists() {
        let (_tmp, root) = setup();
        let err = resolve_contained(&root, "../secret.txt").unwrap_err();
        assert!(err.is_violation());
        let err = resolve_contained(&root, "../../etc/passwd").unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn rejects_sibling_prefix_directories() {
        let (_tmp, root) = setup();
        let err = resolve_contained(&root, "../outputs-evil/x.xlsx").unwrap_err();
        assert!(err.is_violation());

        let absolute = root.parent().unwrap().join("outputs-evil/x.xlsx");
        let err = resolve_contained(&root, &absolute).unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn rejects_the_root_itself() {
        let (_tmp, root) = setup();
        assert!(resolve_contained(&root, ".").unwrap_err().is_violation());
        assert!(resolve_contained(&root, "").unwrap_err().is_violation());
    }

    #[test]
    fn absolute_paths_inside_root_are_accepted() {
        let (_tmp, root) = setup();
        let absolute = root.join("nested/report.xlsx");
        assert!(resolve_contained(&root, &absolute).is_ok());
    }

    #[test]
    fn missing_inside_root_is_not_a_violation() {
        let (_tmp, root) = setup();
        let err = resolve_contained(&root, "nested/missing.xlsx").unwrap_err();
        assert!(matches!(err, ContainmentError::Missing(_)));
        assert!(!err.is_violation());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlinks_pointing_outside() {
        let (tmp, root) = setup();
        std::os::unix::fs::symlink(tmp.path().join("secret.txt"), root.join("link.xlsx")).unwrap();
        let err = resolve_contained(&root, "link.xlsx").unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn safe_relative_rules() {
        assert!(is_safe_relative(Path::new("documents/a.pdf")));
        assert!(is_safe_relative(Path::new("a/../b")));
        assert!(!is_safe_relative(Path::new("a/../../b")));
        assert!(!is_safe_relative(Path::new("/etc/passwd")));
        assert!(!is_safe_relative(Path::new("a/..")));
        assert!(!is_safe_relative(Path::new("..")));
    }

    proptest! {
        #[test]
        fn resolved_paths_never_leave_root(parts in proptest::collection::vec(
            prop_oneof![
                Just("..".to_string()),
                Just(".".to_string()),
                Just("nested".to_string()),
                Just("outputs".to_string()),
                Just("outputs-evil".to_string()),
                Just("report.xlsx".to_string()),
                Just("x.xlsx".to_string()),
                Just("secret.txt".to_string()),
            ],
            0..6,
        )) {
            let (_tmp, root) = setup();
            let candidate: PathBuf = parts.iter().collect();
            if let Ok(resolved) = resolve_contained(&root, &candidate) {
                let canonical_root = root.canonicalize().unwrap();
                prop_assert!(resolved.starts_with(&canonical_root));
                prop_assert!(resolved != canonical_root);
            }
        }
    }
}
