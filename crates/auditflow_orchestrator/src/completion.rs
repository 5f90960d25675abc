//! Deciding whether a run has finished.
//!
//! The manifest's own status wins. Log markers are a fallback for analyzers
//! that write their final manifest late, and only ever match a whole line.

use auditflow_protocol::RunStatus;
use auditflow_runs::{RunManifestStore, RunStoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    Done,
    Error,
}

impl Terminal {
    pub fn is_success(&self) -> bool {
        matches!(self, Terminal::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMarkers {
    /// Whole trimmed lines meaning success.
    pub done: Vec<String>,
    /// Whole trimmed lines meaning failure.
    pub error: Vec<String>,
    /// Line prefixes meaning the analyzer crashed.
    pub crash_prefixes: Vec<String>,
}

impl Default for LogMarkers {
    fn default() -> Self {
        Self {
            done: vec!["[run] done".to_string()],
            error: vec!["[run] error".to_string()],
            crash_prefixes: vec!["Traceback (most recent call last)".to_string()],
        }
    }
}

impl LogMarkers {
    /// Scan log text line by line; the last marker seen wins.
    pub fn scan(&self, log: &str) -> Option<Terminal> {
        let mut found = None;
        for line in log.lines() {
            let line = line.trim();
            if self.done.iter().any(|marker| marker == line) {
                found = Some(Terminal::Done);
            } else if self.error.iter().any(|marker| marker == line)
                || self
                    .crash_prefixes
                    .iter()
                    .any(|prefix| line.starts_with(prefix.as_str()))
            {
                found = Some(Terminal::Error);
            }
        }
        found
    }
}

/// Polls one run's state through the manifest store.
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    store: RunManifestStore,
    markers: Option<LogMarkers>,
}

impl CompletionWatch {
    pub fn new(store: RunManifestStore) -> Self {
        Self {
            store,
            markers: Some(LogMarkers::default()),
        }
    }

    pub fn store(&self) -> &RunManifestStore {
        &self.store
    }

    /// `None` disables the log fallback entirely.
    pub fn with_markers(mut self, markers: Option<LogMarkers>) -> Self {
        self.markers = markers;
        self
    }

    /// Check on a blocking worker thread; the store reads plain files.
    pub async fn check(&self, run_id: &str) -> Option<Terminal> {
        let watch = self.clone();
        let owned = run_id.to_string();
        match tokio::task::spawn_blocking(move || watch.check_now(&owned)).await {
            Ok(terminal) => terminal,
            Err(err) => {
                warn!(run_id, error = %err, "Completion check task failed");
                None
            }
        }
    }

    /// `None` while the run is still going or not yet visible.
    pub fn check_now(&self, run_id: &str) -> Option<Terminal> {
        let record = match self.store.get(run_id) {
            Ok(record) => record,
            Err(err) => {
                log_watch_error(run_id, &err);
                return None;
            }
        };
        match record.status {
            RunStatus::Done => return Some(Terminal::Done),
            RunStatus::Error => return Some(Terminal::Error),
            RunStatus::Running => {}
        }

        let markers = self.markers.as_ref()?;
        match self.store.get_log(run_id) {
            Ok(log) => markers.scan(&log),
            Err(err) => {
                log_watch_error(run_id, &err);
                None
            }
        }
    }
}

fn log_watch_error(run_id: &str, err: &RunStoreError) {
    if err.is_not_found() {
        debug!(run_id, "Run not visible yet");
    } else {
        warn!(run_id, error = %err, "Failed to read run state");
    }
}
