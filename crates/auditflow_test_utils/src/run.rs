//! Builder for run directories.

use crate::StorageFixture;
use auditflow_protocol::defaults::{ARTIFACTS_DIR, RUN_LOG_FILE, RUN_MANIFEST_FILE};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::PathBuf;

/// A run directory under construction.
pub struct RunFixture<'a> {
    fixture: &'a StorageFixture,
    run_id: String,
    manifest: Option<Map<String, Value>>,
    outputs: Map<String, Value>,
    log: Option<String>,
    artifacts: Vec<(String, Vec<u8>)>,
}

impl<'a> RunFixture<'a> {
    pub(crate) fn new(fixture: &'a StorageFixture, run_id: &str) -> Self {
        Self {
            fixture,
            run_id: run_id.to_string(),
            manifest: None,
            outputs: Map::new(),
            log: None,
            artifacts: Vec::new(),
        }
    }

    fn manifest_mut(&mut self) -> &mut Map<String, Value> {
        let run_id = self.run_id.clone();
        self.manifest.get_or_insert_with(|| {
            let mut map = Map::new();
            map.insert("runId".into(), json!(run_id));
            map.insert("module".into(), json!("intake_audit"));
            map.insert("scope".into(), json!("all"));
            map.insert("status".into(), json!("running"));
            map.insert("startedAt".into(), json!("2026-10-18T10:15:00Z"));
            map
        })
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.manifest_mut().insert(key.to_string(), value);
        self
    }

    pub fn module(self, module: &str) -> Self {
        self.set("module", json!(module))
    }

    pub fn status(self, status: &str) -> Self {
        self.set("status", json!(status))
    }

    pub fn scope(self, scope: &str) -> Self {
        self.set("scope", json!(scope))
    }

    pub fn started_at(self, at: DateTime<Utc>) -> Self {
        self.set("startedAt", json!(at.to_rfc3339()))
    }

    pub fn finished_at(self, at: DateTime<Utc>) -> Self {
        self.set("finishedAt", json!(at.to_rfc3339()))
    }

    pub fn error(self, message: &str) -> Self {
        self.set("error", json!(message))
    }

    pub fn case_manager(self, key: &str, name: &str) -> Self {
        self.set(
            "selection",
            json!({"caseManagerKey": key, "caseManagerName": name, "cacheHit": false}),
        )
    }

    pub fn xlsx(mut self, relative: &str) -> Self {
        self.manifest_mut();
        self.outputs.insert("xlsx".into(), json!(relative));
        self
    }

    pub fn xlsx_list(mut self, relatives: &[&str]) -> Self {
        self.manifest_mut();
        self.outputs.insert("xlsxList".into(), json!(relatives));
        self
    }

    pub fn pdf(mut self, relative: &str) -> Self {
        self.manifest_mut();
        self.outputs.insert("pdf".into(), json!(relative));
        self
    }

    pub fn sheet_url(mut self, url: &str) -> Self {
        self.manifest_mut();
        self.outputs.insert("sheetUrl".into(), json!(url));
        self
    }

    pub fn form_url(mut self, url: &str) -> Self {
        self.manifest_mut();
        self.outputs.insert("formUrl".into(), json!(url));
        self
    }

    /// Contents of `run.log`.
    pub fn log(mut self, text: &str) -> Self {
        self.log = Some(text.to_string());
        self
    }

    /// A file inside `runs/<runId>/artifacts/`.
    pub fn artifact(mut self, name: &str, body: &[u8]) -> Self {
        self.artifacts.push((name.to_string(), body.to_vec()));
        self
    }

    /// Materialize the run directory and return its path.
    pub fn write(self) -> PathBuf {
        let dir = self.fixture.run_dir_only(&self.run_id);

        if let Some(mut manifest) = self.manifest {
            if !self.outputs.is_empty() {
                manifest.insert("outputs".into(), Value::Object(self.outputs));
            }
            let body = serde_json::to_vec_pretty(&Value::Object(manifest)).expect("serialize");
            fs::write(dir.join(RUN_MANIFEST_FILE), body).expect("write manifest");
        }

        if let Some(log) = self.log {
            fs::write(dir.join(RUN_LOG_FILE), log).expect("write log");
        }

        if !self.artifacts.is_empty() {
            let artifacts = dir.join(ARTIFACTS_DIR);
            fs::create_dir_all(&artifacts).expect("create artifacts dir");
            for (name, body) in self.artifacts {
                fs::write(artifacts.join(name), body).expect("write artifact");
            }
        }
        dir
    }
}
