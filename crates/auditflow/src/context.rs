//! Services built from the resolved home directory and config.

use crate::config::{resolve, AuditflowConfig, ConfigError};
use auditflow_directory::{
    CaseManagerDirectory, DatabaseRosterSource, DirectoryError, GcsObjectStore,
    LatestBatchRosterSource, ObjectStoreRosterSource, RosterFileSource,
};
use auditflow_intake::{BatchCatalog, BatchStager};
use auditflow_orchestrator::{ProcessLauncher, RunAllOrchestrator};
use auditflow_protocol::StorageRoot;
use auditflow_runs::{ArtifactResolver, RunManifestStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AppContext {
    pub home: PathBuf,
    pub config_path: PathBuf,
    pub config: AuditflowConfig,
    pub storage: StorageRoot,
}

impl AppContext {
    /// An explicit `config_path` must exist; the default `<home>/config.toml`
    /// may be absent.
    pub fn load(home: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let (config_path, config) = match config_path {
            Some(path) => {
                let config = AuditflowConfig::load_required(&path)?;
                (path, config)
            }
            None => {
                let path = home.join("config.toml");
                let config = AuditflowConfig::load(&path)?;
                (path, config)
            }
        };
        Ok(Self::from_config(home, config_path, config))
    }

    pub fn from_config(home: PathBuf, config_path: PathBuf, config: AuditflowConfig) -> Self {
        let mut storage = StorageRoot::new(config.storage_root(&home));
        if let Some(outputs) = config.outputs_dir(&home) {
            storage = storage.with_outputs(outputs);
        }
        debug!(home = %home.display(), storage = %storage.root().display(), "Resolved storage");
        Self {
            home,
            config_path,
            config,
            storage,
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Create the storage subtrees if they are missing.
    pub fn ensure_storage(&self) -> std::io::Result<()> {
        self.storage.ensure()
    }

    pub fn stager(&self) -> BatchStager {
        BatchStager::new(self.storage.clone())
            .with_limits(self.config.limits)
            .with_classifier(self.config.classifier.clone())
    }

    pub fn batches(&self) -> BatchCatalog {
        BatchCatalog::new(self.storage.clone())
    }

    pub fn runs(&self) -> RunManifestStore {
        RunManifestStore::new(self.storage.clone())
    }

    pub fn artifacts(&self) -> ArtifactResolver {
        ArtifactResolver::new(self.runs())
    }

    pub fn launcher(&self) -> ProcessLauncher {
        ProcessLauncher::new(self.storage.clone(), self.config.analyzer.clone())
    }

    pub fn orchestrator(&self) -> RunAllOrchestrator {
        RunAllOrchestrator::new(
            Arc::new(self.launcher()),
            self.storage.clone(),
            self.config.orchestrator.to_config(),
        )
    }

    /// Directory with roster sources in priority order: database, roster
    /// file, newest batch, object storage.
    pub fn directory(&self) -> Result<CaseManagerDirectory, DirectoryError> {
        let section = &self.config.directory;
        let mut directory = CaseManagerDirectory::new(self.runs(), section.naming.clone());

        if let Some(database) = &section.database {
            directory = directory.with_source(Box::new(DatabaseRosterSource::new(
                self.storage_path(&database.path),
                database.roster_query(),
            )));
        }
        if let Some(roster_file) = &section.roster_file {
            directory = directory.with_source(Box::new(RosterFileSource::new(
                self.storage_path(roster_file),
            )));
        }
        if section.latest_batch {
            directory = directory.with_source(Box::new(LatestBatchRosterSource::new(
                self.batches(),
                self.config.classifier.clone(),
            )));
        }
        if let Some(remote) = &section.object_store {
            let mut store =
                GcsObjectStore::new(remote.bucket.clone(), Duration::from_secs(remote.timeout_secs))?
                    .with_token(std::env::var(&remote.token_env).ok());
            if let Some(endpoint) = &remote.endpoint {
                store = store.with_endpoint(endpoint)?;
            }
            directory = directory.with_source(Box::new(ObjectStoreRosterSource::new(
                Arc::new(store),
                remote.prefix.clone(),
                self.config.classifier.clone(),
            )));
        }
        Ok(directory)
    }

    fn storage_path(&self, path: &Path) -> PathBuf {
        resolve(self.storage.root(), path)
    }
}
