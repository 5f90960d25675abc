//! Run every configured analysis module over one batch.

use crate::completion::{CompletionWatch, LogMarkers, Terminal};
use crate::error::{LaunchError, OrchestratorError};
use crate::launcher::{log_tail, RunLauncher, FAILURE_LOG_LINES};
use crate::request::{CaseManagerSelection, LaunchedRun, RunExit, RunRequest};
use auditflow_intake::BatchCatalog;
use auditflow_protocol::defaults::{DEFAULT_MODULE_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS};
use auditflow_protocol::{RunScope, StorageRoot};
use auditflow_runs::RunManifestStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Modules in run order.
    pub modules: Vec<String>,
    pub poll_interval: Duration,
    pub module_timeout: Duration,
    /// `None` trusts manifest status only.
    pub log_markers: Option<LogMarkers>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            module_timeout: Duration::from_secs(DEFAULT_MODULE_TIMEOUT_SECS),
            log_markers: Some(LogMarkers::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAllRequest {
    pub batch_id: String,
    pub scope: RunScope,
    pub case_manager: Option<CaseManagerSelection>,
    /// Subset of the configured modules; configured order is kept.
    pub modules: Option<Vec<String>>,
}

impl RunAllRequest {
    pub fn new(batch_id: impl Into<String>, scope: RunScope) -> Self {
        Self {
            batch_id: batch_id.into(),
            scope,
            case_manager: None,
            modules: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleOutcome {
    Succeeded,
    /// The run reached `error`, or its process exited unsuccessfully.
    Failed,
    TimedOut,
    /// The run could not be created.
    LaunchFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResult {
    pub module: String,
    pub outcome: ModuleOutcome,
    pub run_id: Option<String>,
    pub message: Option<String>,
    pub elapsed_ms: u64,
}

impl ModuleResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == ModuleOutcome::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAllSummary {
    pub batch_id: String,
    pub scope: RunScope,
    pub results: Vec<ModuleResult>,
    /// Module to run id, succeeded modules only.
    pub run_ids: BTreeMap<String, String>,
    pub attempted: usize,
    pub succeeded: usize,
}

/// How waiting on one run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Finished(Terminal),
    /// The process ended unsuccessfully without a terminal status.
    Exited(RunExit),
    TimedOut,
}

pub struct RunAllOrchestrator {
    launcher: Arc<dyn RunLauncher>,
    watch: CompletionWatch,
    batches: BatchCatalog,
    config: OrchestratorConfig,
}

impl RunAllOrchestrator {
    pub fn new(
        launcher: Arc<dyn RunLauncher>,
        storage: StorageRoot,
        config: OrchestratorConfig,
    ) -> Self {
        let watch = CompletionWatch::new(RunManifestStore::new(storage.clone()))
            .with_markers(config.log_markers.clone());
        Self {
            launcher,
            watch,
            batches: BatchCatalog::new(storage),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate the request, then run each module to completion in order.
    ///
    /// Module failures are recorded in the summary; only request validation
    /// returns an error.
    pub async fn run_all(
        &self,
        request: RunAllRequest,
    ) -> Result<RunAllSummary, OrchestratorError> {
        let batches = self.batches.clone();
        let batch_id = request.batch_id.trim().to_string();
        let batch = tokio::task::spawn_blocking(move || batches.load(&batch_id)).await??;
        let case_manager = match request.scope {
            RunScope::All => None,
            RunScope::CaseManager => match request.case_manager {
                Some(cm) if !cm.key.trim().is_empty() => Some(cm),
                _ => return Err(OrchestratorError::MissingCaseManager),
            },
        };
        let modules = self.effective_modules(request.modules.as_deref())?;

        info!(
            batch_id = %batch.batch_id,
            scope = %request.scope,
            modules = ?modules,
            "Starting run-all"
        );

        // Modules share one batch and one output tree: never start module
        // i+1 until module i is terminal or has timed out.
        let mut results = Vec::with_capacity(modules.len());
        for module in &modules {
            let run_request =
                RunRequest::new(module.clone(), request.scope, batch.batch_id.clone())
                    .with_case_manager(case_manager.clone());
            results.push(self.run_module(&run_request).await);
        }

        let run_ids: BTreeMap<String, String> = results
            .iter()
            .filter(|result| result.succeeded())
            .filter_map(|result| Some((result.module.clone(), result.run_id.clone()?)))
            .collect();
        let succeeded = results.iter().filter(|result| result.succeeded()).count();

        info!(
            batch_id = %batch.batch_id,
            attempted = results.len(),
            succeeded,
            "Run-all finished"
        );

        Ok(RunAllSummary {
            batch_id: batch.batch_id.to_string(),
            scope: request.scope,
            attempted: results.len(),
            succeeded,
            run_ids,
            results,
        })
    }

    fn effective_modules(
        &self,
        requested: Option<&[String]>,
    ) -> Result<Vec<String>, OrchestratorError> {
        let modules = match requested {
            None => self.config.modules.clone(),
            Some(requested) => {
                let requested: Vec<&str> = requested.iter().map(|m| m.trim()).collect();
                let unknown: Vec<String> = requested
                    .iter()
                    .filter(|name| !self.config.modules.iter().any(|m| m == *name))
                    .map(|name| name.to_string())
                    .collect();
                if !unknown.is_empty() {
                    return Err(OrchestratorError::UnknownModules(unknown));
                }
                self.config
                    .modules
                    .iter()
                    .filter(|m| requested.contains(&m.as_str()))
                    .cloned()
                    .collect()
            }
        };
        if modules.is_empty() {
            return Err(OrchestratorError::NoModules);
        }
        Ok(modules)
    }

    async fn run_module(&self, request: &RunRequest) -> ModuleResult {
        let started = Instant::now();
        let launched = match self.launcher.create_run(request).await {
            Ok(launched) => launched,
            Err(err) => {
                warn!(module = %request.module, error = %err, "Failed to create run");
                return ModuleResult {
                    module: request.module.clone(),
                    outcome: ModuleOutcome::LaunchFailed,
                    run_id: None,
                    message: Some(err.to_string()),
                    elapsed_ms: elapsed_ms(started),
                };
            }
        };
        let run_id = launched.run_id.to_string();
        info!(module = %request.module, run_id = %run_id, "Run created; waiting");

        let (outcome, message) = match self.wait_for_terminal(&launched, started).await {
            Wait::Finished(Terminal::Done) => (ModuleOutcome::Succeeded, None),
            Wait::Finished(Terminal::Error) => (
                ModuleOutcome::Failed,
                Some(self.failure_message(&run_id).await),
            ),
            Wait::Exited(exit) => {
                let diagnostics = log_tail(
                    self.watch.store().storage(),
                    &launched.run_id,
                    FAILURE_LOG_LINES,
                )
                .await;
                (
                    ModuleOutcome::Failed,
                    Some(LaunchError::from_exit(&run_id, exit.code, &diagnostics).to_string()),
                )
            }
            Wait::TimedOut => (
                ModuleOutcome::TimedOut,
                Some(format!(
                    "No terminal status after {}s",
                    self.config.module_timeout.as_secs_f64()
                )),
            ),
        };

        if outcome == ModuleOutcome::Succeeded {
            info!(module = %request.module, run_id = %run_id, "Module done");
        } else {
            warn!(
                module = %request.module,
                run_id = %run_id,
                outcome = ?outcome,
                "Module did not succeed"
            );
        }

        ModuleResult {
            module: request.module.clone(),
            outcome,
            run_id: Some(run_id),
            message,
            elapsed_ms: elapsed_ms(started),
        }
    }

    /// Poll until the run is terminal, its process fails, or the module
    /// deadline passes.
    ///
    /// The exit is read before the status so a manifest written just before
    /// a clean exit is still seen on the same pass.
    async fn wait_for_terminal(&self, launched: &LaunchedRun, started: Instant) -> Wait {
        let run_id = launched.run_id.as_str();
        let deadline = started + self.config.module_timeout;
        let mut exited_cleanly = false;
        loop {
            let exit = self.launcher.exit_status(&launched.run_id);
            if let Some(terminal) = self.watch.check(run_id).await {
                return Wait::Finished(terminal);
            }
            match exit {
                Some(exit) if !exit.success() => {
                    warn!(
                        run_id,
                        code = ?exit.code,
                        "Analyzer exited before reaching a terminal status"
                    );
                    return Wait::Exited(exit);
                }
                Some(_) if !exited_cleanly => {
                    exited_cleanly = true;
                    warn!(
                        run_id,
                        "Analyzer exited cleanly without a terminal status; still polling"
                    );
                }
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Wait::TimedOut;
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn failure_message(&self, run_id: &str) -> String {
        let store = self.watch.store().clone();
        let run_id = run_id.to_string();
        tokio::task::spawn_blocking(move || {
            store.get(&run_id).ok().and_then(|record| record.error)
        })
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| "Run ended with status error".to_string())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u64::MAX as u128) as u64
}
