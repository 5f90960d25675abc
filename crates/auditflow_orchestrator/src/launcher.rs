//! Creating analyzer runs.
//!
//! The default launcher spawns the configured analyzer command once per run.
//! The request travels as `AUDITFLOW_*` environment variables and as
//! `{placeholder}` substitutions in the configured arguments; stdout and
//! stderr are appended to the run's `run.log`.

use crate::error::LaunchError;
use crate::request::{LaunchedRun, RunExit, RunRequest};
use async_trait::async_trait;
use auditflow_ids::RunId;
use auditflow_protocol::{RunScope, StorageRoot};
use auditflow_runs::RunManifestStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::fs::OpenOptions;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub(crate) const FAILURE_LOG_LINES: usize = 40;

/// Creates one analyzer run per request.
#[async_trait]
pub trait RunLauncher: Send + Sync {
    /// Start a run and return its id without waiting for it to finish.
    async fn create_run(&self, request: &RunRequest) -> Result<LaunchedRun, LaunchError>;

    /// Exit of a run this launcher started, once the process has ended.
    ///
    /// `None` while it is still running, or when the launcher cannot observe
    /// its runs at all.
    fn exit_status(&self, _run_id: &RunId) -> Option<RunExit> {
        None
    }
}

/// The analyzer executable and its argument template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl AnalyzerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.program.trim().is_empty()
    }
}

/// Launches the analyzer as a child process of this one.
///
/// Runs are not owned: dropping the launcher never kills the analyzer. Child
/// handles are kept until their exit has been observed, so a crash is seen
/// without waiting for a manifest that will never be written.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    storage: StorageRoot,
    command: AnalyzerCommand,
    children: Arc<Mutex<HashMap<RunId, Child>>>,
}

impl ProcessLauncher {
    pub fn new(storage: StorageRoot, command: AnalyzerCommand) -> Self {
        Self {
            storage,
            command,
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn command(&self) -> &AnalyzerCommand {
        &self.command
    }

    /// Start a run and block until the analyzer exits.
    ///
    /// A non-zero exit becomes [`LaunchError::ExternalFailure`] carrying the
    /// tail of `run.log`.
    pub async fn run_and_wait(&self, request: &RunRequest) -> Result<LaunchedRun, LaunchError> {
        let (launched, mut child) = self.spawn(request).await?;
        let status = child.wait().await.map_err(|source| LaunchError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        if status.success() {
            info!(run_id = %launched.run_id, "Analyzer exited cleanly");
            return Ok(launched);
        }

        let diagnostics = log_tail(&self.storage, &launched.run_id, FAILURE_LOG_LINES).await;
        warn!(run_id = %launched.run_id, code = ?status.code(), "Analyzer exited with failure");
        Err(LaunchError::from_exit(
            launched.run_id.as_str(),
            status.code(),
            &diagnostics,
        ))
    }

    async fn spawn(&self, request: &RunRequest) -> Result<(LaunchedRun, Child), LaunchError> {
        if !self.command.is_configured() {
            return Err(LaunchError::NotConfigured);
        }
        validate_request(request)?;

        let run_id = RunId::generate();
        let run_dir = self.storage.run_dir(&run_id);
        let artifacts_dir = self.storage.run_artifacts_dir(&run_id);
        tokio::fs::create_dir_all(&artifacts_dir)
            .await
            .map_err(|err| LaunchError::io(&artifacts_dir, err))?;

        let log_path = self.storage.run_log(&run_id);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .map_err(|err| LaunchError::io(&log_path, err))?
            .into_std()
            .await;
        let stderr_log = log
            .try_clone()
            .map_err(|err| LaunchError::io(&log_path, err))?;

        let vars = self.request_vars(&run_id, request);
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.args.iter().map(|arg| substitute(arg, &vars)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(false);
        for (name, value) in &vars {
            cmd.env(env_name(name), value);
        }
        if let Some(dir) = &self.command.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;
        let pid = child.id();

        info!(
            run_id = %run_id,
            module = %request.module,
            scope = %request.scope,
            batch_id = %request.batch_id,
            pid = ?pid,
            run_dir = %run_dir.display(),
            "Spawned analyzer"
        );

        Ok((LaunchedRun { run_id, pid }, child))
    }

    fn request_vars(&self, run_id: &RunId, request: &RunRequest) -> Vec<(&'static str, String)> {
        let (key, label) = request
            .case_manager
            .as_ref()
            .map(|cm| (cm.key.clone(), cm.label.clone()))
            .unwrap_or_default();
        vec![
            ("run_id", run_id.to_string()),
            (
                "run_dir",
                self.storage.run_dir(run_id).display().to_string(),
            ),
            ("module", request.module.clone()),
            ("scope", request.scope.as_str().to_string()),
            ("batch_id", request.batch_id.to_string()),
            (
                "batch_dir",
                self.storage.batch_dir(&request.batch_id).display().to_string(),
            ),
            (
                "output_dir",
                self.storage.outputs_dir().display().to_string(),
            ),
            ("case_manager_key", key),
            ("case_manager_label", label),
        ]
    }
}

#[async_trait]
impl RunLauncher for ProcessLauncher {
    async fn create_run(&self, request: &RunRequest) -> Result<LaunchedRun, LaunchError> {
        let (launched, child) = self.spawn(request).await?;
        match self.children.lock() {
            Ok(mut children) => {
                children.insert(launched.run_id.clone(), child);
            }
            Err(_) => warn!(
                run_id = %launched.run_id,
                "Child table poisoned; exit will not be observed"
            ),
        }
        Ok(launched)
    }

    fn exit_status(&self, run_id: &RunId) -> Option<RunExit> {
        let mut children = self.children.lock().ok()?;
        let child = children.get_mut(run_id)?;
        match child.try_wait() {
            Ok(Some(status)) => {
                children.remove(run_id);
                let exit = RunExit::from(status);
                debug!(run_id = %run_id, code = ?exit.code, "Analyzer process exited");
                Some(exit)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Failed to poll analyzer process");
                children.remove(run_id);
                None
            }
        }
    }
}

/// Last `lines` of a run's log, read on a blocking worker thread.
pub(crate) async fn log_tail(storage: &StorageRoot, run_id: &RunId, lines: usize) -> String {
    let store = RunManifestStore::new(storage.clone());
    let run_id = run_id.to_string();
    tokio::task::spawn_blocking(move || store.log_tail(&run_id, lines).unwrap_or_default())
        .await
        .unwrap_or_default()
}

fn validate_request(request: &RunRequest) -> Result<(), LaunchError> {
    if request.module.trim().is_empty() {
        return Err(LaunchError::InvalidRequest("module name is empty".into()));
    }
    if request.scope == RunScope::CaseManager {
        let has_key = request
            .case_manager
            .as_ref()
            .is_some_and(|cm| !cm.key.trim().is_empty());
        if !has_key {
            return Err(LaunchError::InvalidRequest(
                "scope case_manager requires a case manager key".into(),
            ));
        }
    }
    Ok(())
}

fn env_name(name: &str) -> String {
    format!("AUDITFLOW_{}", name.to_ascii_uppercase())
}

/// Replace `{name}` placeholders; unknown placeholders are left as written.
fn substitute(template: &str, vars: &[(&'static str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
