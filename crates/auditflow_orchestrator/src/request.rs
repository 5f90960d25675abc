use auditflow_ids::{BatchId, RunId};
use auditflow_protocol::RunScope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseManagerSelection {
    pub key: String,
    pub label: String,
}

/// What the analyzer is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub module: String,
    pub scope: RunScope,
    pub batch_id: BatchId,
    /// Present only for `case_manager` scope.
    pub case_manager: Option<CaseManagerSelection>,
}

impl RunRequest {
    pub fn new(module: impl Into<String>, scope: RunScope, batch_id: BatchId) -> Self {
        Self {
            module: module.into(),
            scope,
            batch_id,
            case_manager: None,
        }
    }

    pub fn with_case_manager(mut self, selection: Option<CaseManagerSelection>) -> Self {
        self.case_manager = match self.scope {
            RunScope::CaseManager => selection,
            RunScope::All => None,
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedRun {
    pub run_id: RunId,
    pub pid: Option<u32>,
}

/// How an analyzer process ended, as seen by the launcher that spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunExit {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl RunExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for RunExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}
