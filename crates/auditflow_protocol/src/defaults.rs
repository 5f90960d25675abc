//! Canonical default values shared by every crate and the analyzer.

pub const UPLOADS_DIR: &str = "uploads";
pub const RUNS_DIR: &str = "runs";
pub const OUTPUTS_DIR: &str = "outputs";

pub const BATCH_MANIFEST_FILE: &str = "batch.json";
pub const RUN_MANIFEST_FILE: &str = "manifest.json";
pub const RUN_LOG_FILE: &str = "run.log";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const LEGACY_LOG_EXTENSION: &str = "log";

pub const DEFAULT_MAX_FILES: usize = 50;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 500 * 1024 * 1024;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MODULE_TIMEOUT_SECS: u64 = 30 * 60;

pub const DEFAULT_CASE_MANAGER_PREFIX: &str = "audit_";
pub const DEFAULT_CASE_MANAGER_SUFFIX: &str = ".xlsx";

pub const LOG_STUB_MESSAGE: &str = "No log output yet; manifest contents follow.";
