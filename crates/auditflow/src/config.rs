//! `config.toml` loading.
//!
//! Every section is optional; a missing file means all defaults. Relative
//! paths are resolved against the Auditflow home directory.

use auditflow_db::RosterQuery;
use auditflow_intake::{Classifier, StagingLimits};
use auditflow_orchestrator::{AnalyzerCommand, LogMarkers, OrchestratorConfig};
use auditflow_protocol::defaults::{DEFAULT_MODULE_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS};
use auditflow_protocol::CaseManagerNaming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GCS_TOKEN_ENV: &str = "AUDITFLOW_GCS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditflowConfig {
    pub storage: StorageSection,
    pub limits: StagingLimits,
    pub classifier: Classifier,
    pub analyzer: AnalyzerCommand,
    pub orchestrator: OrchestratorSection,
    pub directory: DirectorySection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Defaults to `<home>/storage`.
    pub root: Option<PathBuf>,
    /// Defaults to `<root>/outputs`.
    pub outputs: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub modules: Vec<String>,
    pub poll_interval_secs: u64,
    pub module_timeout_secs: u64,
    /// Accept whole-line log markers when the manifest still says running.
    pub log_markers: bool,
    pub markers: LogMarkers,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            module_timeout_secs: DEFAULT_MODULE_TIMEOUT_SECS,
            log_markers: true,
            markers: LogMarkers::default(),
        }
    }
}

impl OrchestratorSection {
    pub fn to_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            modules: self.modules.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            module_timeout: Duration::from_secs(self.module_timeout_secs),
            log_markers: self.log_markers.then(|| self.markers.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySection {
    pub naming: CaseManagerNaming,
    /// Roster database; relative paths are under the storage root.
    pub database: Option<DatabaseSection>,
    /// Canonical roster file; relative paths are under the storage root.
    pub roster_file: Option<PathBuf>,
    /// Fall back to the roster file of the newest staged batch.
    pub latest_batch: bool,
    pub object_store: Option<ObjectStoreSection>,
}

impl Default for DirectorySection {
    fn default() -> Self {
        Self {
            naming: CaseManagerNaming::default(),
            database: Some(DatabaseSection::default()),
            roster_file: Some(PathBuf::from("case_managers.csv")),
            latest_batch: true,
            object_store: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub table: String,
    pub column: String,
    /// Custom read-only query; overrides `table`/`column`.
    pub query: Option<String>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("roster.sqlite"),
            table: "case_managers".to_string(),
            column: "name".to_string(),
            query: None,
        }
    }
}

impl DatabaseSection {
    pub fn roster_query(&self) -> RosterQuery {
        match &self.query {
            Some(sql) if !sql.trim().is_empty() => RosterQuery::Custom(sql.clone()),
            _ => RosterQuery::table(self.table.clone(), self.column.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSection {
    pub bucket: String,
    pub prefix: String,
    pub endpoint: Option<String>,
    /// Environment variable holding a bearer token.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for ObjectStoreSection {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            endpoint: None,
            token_env: DEFAULT_GCS_TOKEN_ENV.to_string(),
            timeout_secs: 30,
        }
    }
}

impl AuditflowConfig {
    /// Load `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_required(path) {
            Err(ConfigError::Missing(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Load a file the user named explicitly; a missing file is an error.
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()))
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_files == 0 {
            return Err(ConfigError::Invalid("limits.max_files must be at least 1".into()));
        }
        if self.limits.max_file_bytes > self.limits.max_total_bytes {
            return Err(ConfigError::Invalid(
                "limits.max_file_bytes exceeds limits.max_total_bytes".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for module in &self.orchestrator.modules {
            if module.trim().is_empty() {
                return Err(ConfigError::Invalid("orchestrator.modules has an empty name".into()));
            }
            if !seen.insert(module.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "orchestrator.modules lists '{}' twice",
                    module
                )));
            }
        }
        if let Some(store) = &self.directory.object_store {
            if store.bucket.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "directory.object_store.bucket is required".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn storage_root(&self, home: &Path) -> PathBuf {
        match &self.storage.root {
            Some(root) => resolve(home, root),
            None => home.join("storage"),
        }
    }

    pub fn outputs_dir(&self, home: &Path) -> Option<PathBuf> {
        self.storage.outputs.as_ref().map(|dir| resolve(home, dir))
    }
}

/// Join `path` onto `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AuditflowConfig::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, AuditflowConfig::default());
        assert_eq!(config.storage_root(tmp.path()), tmp.path().join("storage"));
        assert!(config.orchestrator.log_markers);
        assert_eq!(config.limits.max_files, 50);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[storage]
root = "data"

[analyzer]
program = "python3"
args = ["-m", "analyzer", "--module", "{module}"]

[orchestrator]
modules = ["intake_audit", "eligibility"]
poll_interval_secs = 2
log_markers = false

[directory.naming]
prefix = "cm_"

[directory.object_store]
bucket = "rosters"
prefix = "exports/"
"#,
        )
        .unwrap();

        let config = AuditflowConfig::load(&path).unwrap();
        assert_eq!(config.storage_root(tmp.path()), tmp.path().join("data"));
        assert_eq!(config.analyzer.args.len(), 4);
        assert_eq!(config.directory.naming.prefix, "cm_");
        assert_eq!(config.directory.naming.suffix, ".xlsx");
        assert_eq!(config.directory.object_store.as_ref().unwrap().token_env, DEFAULT_GCS_TOKEN_ENV);
        assert!(config.directory.database.is_some());

        let orchestrator = config.orchestrator.to_config();
        assert_eq!(orchestrator.poll_interval, Duration::from_secs(2));
        assert_eq!(
            orchestrator.module_timeout,
            Duration::from_secs(DEFAULT_MODULE_TIMEOUT_SECS)
        );
        assert!(orchestrator.log_markers.is_none());
    }

    #[test]
    fn explicit_config_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.toml");
        assert_eq!(AuditflowConfig::load(&path).unwrap(), AuditflowConfig::default());
        assert!(matches!(
            AuditflowConfig::load_required(&path),
            Err(ConfigError::Missing(missing)) if missing == path
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        std::fs::write(&path, "[orchestrator]\nmodules = [\"a\", \"a\"]\n").unwrap();
        assert!(matches!(
            AuditflowConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "[limits]\nmax_files = \"many\"\n").unwrap();
        assert!(matches!(
            AuditflowConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn custom_query_overrides_table() {
        let section = DatabaseSection {
            query: Some("SELECT name FROM staff".into()),
            ..DatabaseSection::default()
        };
        assert_eq!(
            section.roster_query(),
            RosterQuery::Custom("SELECT name FROM staff".into())
        );
        assert_eq!(
            DatabaseSection::default().roster_query(),
            RosterQuery::table("case_managers", "name")
        );
    }
}
