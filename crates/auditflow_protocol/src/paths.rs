use std::path::PathBuf;

/// Resolve the Auditflow home directory.
///
/// Priority:
/// 1) AUDITFLOW_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.auditflow
pub fn auditflow_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("AUDITFLOW_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".auditflow");
    }
    PathBuf::from(".").join(".auditflow")
}

/// Default config file: ~/.auditflow/config.toml
pub fn default_config_path() -> PathBuf {
    auditflow_home().join("config.toml")
}

/// Default storage root: ~/.auditflow/storage
pub fn default_storage_root() -> PathBuf {
    auditflow_home().join("storage")
}

/// Default logs directory: ~/.auditflow/logs
pub fn default_logs_dir() -> PathBuf {
    auditflow_home().join("logs")
}
