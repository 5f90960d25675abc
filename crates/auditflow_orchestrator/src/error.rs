use std::path::PathBuf;
use thiserror::Error;

const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Failures creating or waiting on a single analyzer run.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("No analyzer command is configured")]
    NotConfigured,

    #[error("Failed to start analyzer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The analyzer exited unsuccessfully; `diagnostics` is the log tail.
    #[error("Analyzer run {run_id} failed ({}): {diagnostics}", describe_exit(.code))]
    ExternalFailure {
        run_id: String,
        code: Option<i32>,
        diagnostics: String,
    },
}

impl LaunchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build from an exit status, keeping only the end of long diagnostics.
    pub fn from_exit(run_id: &str, code: Option<i32>, diagnostics: &str) -> Self {
        let diagnostics = diagnostics.trim();
        let char_count = diagnostics.chars().count();
        let diagnostics = if char_count > MAX_DIAGNOSTIC_CHARS {
            let tail: String = diagnostics
                .chars()
                .skip(char_count - MAX_DIAGNOSTIC_CHARS)
                .collect();
            format!("(truncated) ...{}", tail)
        } else if diagnostics.is_empty() {
            "no log output".to_string()
        } else {
            diagnostics.to_string()
        };
        LaunchError::ExternalFailure {
            run_id: run_id.to_string(),
            code,
            diagnostics,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Failures that stop a run-all request before any module starts.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] auditflow_intake::StageError),

    #[error("Scope case_manager requires a case manager key")]
    MissingCaseManager,

    #[error("Unknown module(s): {}", .0.join(", "))]
    UnknownModules(Vec<String>),

    #[error("No modules to run")]
    NoModules,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_errors_keep_the_tail() {
        let long = format!("{}END", "x".repeat(5000));
        let err = LaunchError::from_exit("r1", Some(2), &long);
        match &err {
            LaunchError::ExternalFailure { diagnostics, code, .. } => {
                assert!(diagnostics.ends_with("END"));
                assert!(diagnostics.starts_with("(truncated)"));
                assert_eq!(*code, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.to_string().contains("exit code 2"));

        let err = LaunchError::from_exit("r1", None, "  ");
        assert!(err.to_string().contains("terminated by signal"));
        assert!(err.to_string().contains("no log output"));
    }
}
