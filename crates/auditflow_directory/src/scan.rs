//! Scan output locations for workbooks named `<prefix><key><suffix>`.

use auditflow_protocol::CaseManagerNaming;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

/// Keys and filenames seen in the scanned directories.
#[derive(Debug, Default, Clone)]
pub struct OutputScan {
    pub keys: BTreeSet<String>,
    filenames: HashSet<String>,
}

impl OutputScan {
    pub fn contains_file(&self, filename: &str) -> bool {
        self.filenames.contains(filename)
    }
}

/// Only the top level of each directory is scanned; missing directories are
/// skipped.
pub fn scan_outputs(dirs: &[PathBuf], naming: &CaseManagerNaming) -> OutputScan {
    let mut scan = OutputScan::default();
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(key) = naming.key_from_filename(&name) {
                scan.keys.insert(key);
                scan.filenames.insert(name);
            }
        }
    }
    debug!(dirs = dirs.len(), keys = scan.keys.len(), "Scanned output directories");
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_matching_keys_from_top_level() {
        let tmp = tempfile::tempdir().unwrap();
        let outputs = tmp.path().join("outputs");
        let artifacts = tmp.path().join("runs/r1/artifacts");
        fs::create_dir_all(outputs.join("nested")).unwrap();
        fs::create_dir_all(&artifacts).unwrap();
        fs::write(outputs.join("audit_Jane_R.xlsx"), b"").unwrap();
        fs::write(outputs.join("audit___all__.xlsx"), b"").unwrap();
        fs::write(outputs.join("audit_bad-key.xlsx"), b"").unwrap();
        fs::write(outputs.join("summary.xlsx"), b"").unwrap();
        fs::write(outputs.join("nested/audit_Deep.xlsx"), b"").unwrap();
        fs::write(artifacts.join("audit_Bob_Smith.xlsx"), b"").unwrap();

        let scan = scan_outputs(
            &[outputs, artifacts, tmp.path().join("missing")],
            &CaseManagerNaming::default(),
        );
        let keys: Vec<&str> = scan.keys.iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["Bob_Smith", "Jane_R", "__all__"]);
        assert!(scan.contains_file("audit___all__.xlsx"));
        assert!(!scan.contains_file("audit___blank__.xlsx"));
    }
}
