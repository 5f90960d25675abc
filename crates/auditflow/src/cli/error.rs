//! User-facing errors: what went wrong, the situation, and what to try.

use auditflow::config::ConfigError;
use auditflow_intake::StageError;
use auditflow_orchestrator::{LaunchError, OrchestratorError};
use auditflow_runs::{ArtifactError, RunStoreError};
use serde_json::json;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("Only regular files can be staged")
            .with_suggestion(format!("TRY: Check if the file exists: ls -la {}", path.display()))
    }

    pub fn run_not_found(run_id: &str) -> Self {
        Self::new(format!("Run not found: {}", run_id))
            .with_context("No manifest, legacy manifest or run directory exists for this id")
            .with_suggestion("TRY: auditflow runs   # list known run ids")
    }

    pub fn batch_not_found(batch_id: &str) -> Self {
        Self::new(format!("Batch not found: {}", batch_id))
            .with_context("Batches are created by staging uploads")
            .with_suggestion("TRY: auditflow stage FILE...   # stage a new batch")
    }

    pub fn from_config(err: ConfigError) -> Self {
        match &err {
            ConfigError::Missing(path) => Self::new(err.to_string())
                .with_context("A config file named with --config or AUDITFLOW_CONFIG must exist")
                .with_suggestions([
                    format!("TRY: Check the path: ls -la {}", path.display()),
                    "TRY: Drop --config to use <home>/config.toml or built-in defaults".to_string(),
                ]),
            _ => Self::new(err.to_string())
                .with_suggestion("TRY: auditflow config   # show which file is read"),
        }
    }

    pub fn from_stage(err: StageError) -> Self {
        match err {
            StageError::NotFound(batch_id) => Self::batch_not_found(&batch_id),
            StageError::InvalidBatchId(err) => Self::new(err.to_string())
                .with_suggestion("TRY: auditflow stage FILE...   # prints the new batch id"),
            err if err.is_validation() => Self::new(format!("Upload rejected: {}", err))
                .with_context("No files were written; the whole batch was refused")
                .with_suggestion("TRY: auditflow config   # show the configured limits"),
            err => Self::new(format!("Staging failed: {}", err)),
        }
    }

    pub fn from_run_store(err: RunStoreError) -> Self {
        match err {
            RunStoreError::NotFound(run_id) => Self::run_not_found(&run_id),
            RunStoreError::InvalidId(err) => Self::new(err.to_string())
                .with_suggestion("TRY: auditflow runs   # list known run ids"),
            err => Self::new(format!("Failed to read run: {}", err)),
        }
    }

    pub fn from_artifact(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(run_id) => Self::run_not_found(&run_id),
            ArtifactError::UnknownFormat(message) => Self::new(message),
            err if err.is_not_ready() => Self::new(err.to_string())
                .with_context("The run has not finished producing outputs")
                .with_suggestion("TRY: auditflow status RUN_ID   # check progress"),
            ArtifactError::Containment(err) => Self::new("Artifact path rejected")
                .with_context(err.to_string()),
            err => Self::new(err.to_string()),
        }
    }

    pub fn from_launch(err: LaunchError) -> Self {
        match err {
            LaunchError::NotConfigured => Self::new("No analyzer command is configured")
                .with_context("Runs are created by spawning the analyzer from config.toml")
                .with_suggestion("TRY: add [analyzer] program = \"...\" to config.toml"),
            LaunchError::ExternalFailure {
                run_id,
                code,
                diagnostics,
            } => Self::new(format!(
                "Analyzer run {} failed{}",
                run_id,
                code.map(|code| format!(" with exit code {}", code))
                    .unwrap_or_default()
            ))
            .with_context(diagnostics)
            .with_suggestion(format!("TRY: auditflow log {}", run_id)),
            err => Self::new(err.to_string()),
        }
    }

    pub fn from_orchestrator(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidBatch(err) => Self::from_stage(err),
            OrchestratorError::MissingCaseManager => Self::new(err.to_string())
                .with_suggestion("TRY: auditflow case-managers   # list keys")
                .with_suggestion("TRY: --case-manager KEY"),
            OrchestratorError::NoModules => Self::new(err.to_string())
                .with_context("orchestrator.modules is empty")
                .with_suggestion("TRY: add [orchestrator] modules = [\"...\"] to config.toml"),
            err => Self::new(err.to_string())
                .with_suggestion("TRY: auditflow config   # show configured modules"),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;
        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }
        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => json!({
            "error": {
                "message": helpful.message,
                "context": helpful.context,
                "suggestions": helpful.suggestions,
            }
        }),
        None => json!({
            "error": {
                "message": format!("{:#}", err),
                "context": null,
                "suggestions": [],
            }
        }),
    };
    println!("{}", payload);
}
