//! Count and size ceilings applied before staging starts.

use crate::error::{Result, StageError};
use auditflow_protocol::defaults::{
    DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_TOTAL_BYTES,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingLimits {
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for StagingLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

impl StagingLimits {
    pub fn check_count(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(StageError::NoFiles);
        }
        if count > self.max_files {
            return Err(StageError::TooManyFiles {
                count,
                max: self.max_files,
            });
        }
        Ok(())
    }

    pub fn check_file(&self, name: &str, size: u64) -> Result<()> {
        if size == 0 {
            return Err(StageError::EmptyFile {
                name: name.to_string(),
            });
        }
        if size > self.max_file_bytes {
            return Err(StageError::FileTooLarge {
                name: name.to_string(),
                size,
                max: self.max_file_bytes,
            });
        }
        Ok(())
    }

    pub fn check_total(&self, total: u64) -> Result<()> {
        if total > self.max_total_bytes {
            return Err(StageError::TotalTooLarge {
                total,
                max: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_batches() {
        let limits = StagingLimits {
            max_files: 2,
            max_file_bytes: 10,
            max_total_bytes: 15,
        };
        assert!(matches!(limits.check_count(0), Err(StageError::NoFiles)));
        assert!(matches!(
            limits.check_count(3),
            Err(StageError::TooManyFiles { count: 3, max: 2 })
        ));
        assert!(matches!(
            limits.check_file("a.pdf", 0),
            Err(StageError::EmptyFile { .. })
        ));
        assert!(matches!(
            limits.check_file("a.pdf", 11),
            Err(StageError::FileTooLarge { size: 11, .. })
        ));
        assert!(limits.check_file("a.pdf", 10).is_ok());
        assert!(matches!(
            limits.check_total(16),
            Err(StageError::TotalTooLarge { .. })
        ));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let limits: StagingLimits = serde_json::from_str(r#"{"max_files": 5}"#).unwrap();
        assert_eq!(limits.max_files, 5);
        assert_eq!(limits.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    }
}
