//! Run-all orchestration against scripted launchers.

use async_trait::async_trait;
use auditflow_ids::RunId;
use auditflow_orchestrator::{
    CaseManagerSelection, LaunchError, LaunchedRun, LogMarkers, ModuleOutcome, OrchestratorConfig,
    OrchestratorError, RunAllOrchestrator, RunAllRequest, RunExit, RunLauncher, RunRequest,
};
use auditflow_protocol::{FileKind, RunScope, StorageRoot};
use auditflow_test_utils::StorageFixture;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behavior {
    DoneNow,
    ErrorNow,
    Never,
    FailCreate,
    MarkerDone,
    DoneAfter(Duration),
    /// The process dies with this exit code and never finishes the manifest.
    Crash(i32),
}

struct ScriptedLauncher {
    storage: StorageRoot,
    behaviors: HashMap<String, Behavior>,
    events: Arc<Mutex<Vec<String>>>,
    requests: Mutex<Vec<RunRequest>>,
    exits: Mutex<HashMap<RunId, RunExit>>,
}

impl ScriptedLauncher {
    fn new(storage: &StorageRoot, behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            storage: storage.clone(),
            behaviors: behaviors
                .iter()
                .map(|(module, behavior)| (module.to_string(), *behavior))
                .collect(),
            events: Arc::new(Mutex::new(Vec::new())),
            requests: Mutex::new(Vec::new()),
            exits: Mutex::new(HashMap::new()),
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn write_manifest(storage: &StorageRoot, run_id: &RunId, status: &str, error: Option<&str>) {
    let body = json!({
        "runId": run_id.as_str(),
        "module": "m",
        "scope": "all",
        "status": status,
        "startedAt": "2026-10-18T10:15:00Z",
        "error": error,
    });
    fs::write(
        storage.run_manifest(run_id),
        serde_json::to_vec(&body).unwrap(),
    )
    .unwrap();
}

#[async_trait]
impl RunLauncher for ScriptedLauncher {
    async fn create_run(&self, request: &RunRequest) -> Result<LaunchedRun, LaunchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{}", request.module));

        let behavior = self
            .behaviors
            .get(&request.module)
            .copied()
            .unwrap_or(Behavior::DoneNow);
        if let Behavior::FailCreate = behavior {
            return Err(LaunchError::InvalidRequest("analyzer unavailable".into()));
        }

        let run_id = RunId::generate();
        fs::create_dir_all(self.storage.run_dir(&run_id)).unwrap();
        match behavior {
            Behavior::DoneNow => write_manifest(&self.storage, &run_id, "done", None),
            Behavior::ErrorNow => {
                write_manifest(&self.storage, &run_id, "error", Some("sheet missing"))
            }
            Behavior::Never => write_manifest(&self.storage, &run_id, "running", None),
            Behavior::MarkerDone => {
                write_manifest(&self.storage, &run_id, "running", None);
                fs::write(self.storage.run_log(&run_id), "working\n[run] done\n").unwrap();
            }
            Behavior::DoneAfter(delay) => {
                let storage = self.storage.clone();
                let events = Arc::clone(&self.events);
                let module = request.module.clone();
                let run_id = run_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    events.lock().unwrap().push(format!("done:{}", module));
                    write_manifest(&storage, &run_id, "done", None);
                });
            }
            Behavior::Crash(code) => {
                write_manifest(&self.storage, &run_id, "running", None);
                fs::write(
                    self.storage.run_log(&run_id),
                    "loading roster\nfatal: cannot open workbook\n",
                )
                .unwrap();
                self.exits
                    .lock()
                    .unwrap()
                    .insert(run_id.clone(), RunExit { code: Some(code) });
            }
            Behavior::FailCreate => unreachable!(),
        }
        Ok(LaunchedRun { run_id, pid: None })
    }

    fn exit_status(&self, run_id: &RunId) -> Option<RunExit> {
        self.exits.lock().unwrap().get(run_id).copied()
    }
}

fn config(modules: &[&str]) -> OrchestratorConfig {
    OrchestratorConfig {
        modules: modules.iter().map(|m| m.to_string()).collect(),
        poll_interval: Duration::from_millis(10),
        module_timeout: Duration::from_secs(5),
        log_markers: Some(LogMarkers::default()),
    }
}

fn staged_batch(fixture: &StorageFixture) -> String {
    fixture
        .write_batch(&[(FileKind::Document, "a.pdf", b"%PDF-1.4")])
        .batch_id
}

#[tokio::test]
async fn every_module_yields_exactly_one_result() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let launcher = Arc::new(ScriptedLauncher::new(
        fixture.storage(),
        &[
            ("intake", Behavior::DoneNow),
            ("eligibility", Behavior::ErrorNow),
            ("billing", Behavior::FailCreate),
            ("summary", Behavior::DoneNow),
        ],
    ));
    let orchestrator = RunAllOrchestrator::new(
        launcher.clone(),
        fixture.storage().clone(),
        config(&["intake", "eligibility", "billing", "summary"]),
    );

    let summary = orchestrator
        .run_all(RunAllRequest::new(batch_id.clone(), RunScope::All))
        .await
        .unwrap();

    assert_eq!(summary.batch_id, batch_id);
    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.succeeded, 2);
    let outcomes: Vec<_> = summary.results.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ModuleOutcome::Succeeded,
            ModuleOutcome::Failed,
            ModuleOutcome::LaunchFailed,
            ModuleOutcome::Succeeded,
        ]
    );
    assert_eq!(summary.results[1].message.as_deref(), Some("sheet missing"));
    assert!(summary.results[2].run_id.is_none());
    assert!(summary.results[2]
        .message
        .as_deref()
        .unwrap()
        .contains("analyzer unavailable"));

    let keys: Vec<_> = summary.run_ids.keys().cloned().collect();
    assert_eq!(keys, vec!["intake".to_string(), "summary".to_string()]);
    assert_eq!(
        summary.run_ids.get("intake"),
        summary.results[0].run_id.as_ref()
    );
}

#[tokio::test]
async fn timeout_marks_the_module_and_moves_on() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let launcher = Arc::new(ScriptedLauncher::new(
        fixture.storage(),
        &[("slow", Behavior::Never), ("fast", Behavior::DoneNow)],
    ));
    let mut config = config(&["slow", "fast"]);
    config.module_timeout = Duration::from_millis(150);
    let orchestrator =
        RunAllOrchestrator::new(launcher.clone(), fixture.storage().clone(), config);

    let summary = orchestrator
        .run_all(RunAllRequest::new(batch_id, RunScope::All))
        .await
        .unwrap();

    assert_eq!(summary.results[0].outcome, ModuleOutcome::TimedOut);
    assert!(summary.results[0].run_id.is_some());
    assert!(summary.results[0].elapsed_ms >= 150);
    assert_eq!(summary.results[1].outcome, ModuleOutcome::Succeeded);
    assert!(!summary.run_ids.contains_key("slow"));
}

#[tokio::test]
async fn next_module_waits_for_the_previous_one() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let delay = Duration::from_millis(60);
    let launcher = Arc::new(ScriptedLauncher::new(
        fixture.storage(),
        &[
            ("a", Behavior::DoneAfter(delay)),
            ("b", Behavior::DoneAfter(delay)),
            ("c", Behavior::DoneAfter(delay)),
        ],
    ));
    let orchestrator = RunAllOrchestrator::new(
        launcher.clone(),
        fixture.storage().clone(),
        config(&["a", "b", "c"]),
    );

    let summary = orchestrator
        .run_all(RunAllRequest::new(batch_id, RunScope::All))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(
        launcher.events(),
        vec!["start:a", "done:a", "start:b", "done:b", "start:c", "done:c"]
    );
}

#[tokio::test]
async fn log_markers_are_an_optional_fallback() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let behaviors = [("late", Behavior::MarkerDone)];

    let launcher = Arc::new(ScriptedLauncher::new(fixture.storage(), &behaviors));
    let orchestrator =
        RunAllOrchestrator::new(launcher, fixture.storage().clone(), config(&["late"]));
    let summary = orchestrator
        .run_all(RunAllRequest::new(batch_id.clone(), RunScope::All))
        .await
        .unwrap();
    assert_eq!(summary.results[0].outcome, ModuleOutcome::Succeeded);

    let launcher = Arc::new(ScriptedLauncher::new(fixture.storage(), &behaviors));
    let mut strict = config(&["late"]);
    strict.log_markers = None;
    strict.module_timeout = Duration::from_millis(100);
    let orchestrator = RunAllOrchestrator::new(launcher, fixture.storage().clone(), strict);
    let summary = orchestrator
        .run_all(RunAllRequest::new(batch_id, RunScope::All))
        .await
        .unwrap();
    assert_eq!(summary.results[0].outcome, ModuleOutcome::TimedOut);
}

#[tokio::test]
async fn narrowed_modules_keep_configured_order() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let launcher = Arc::new(ScriptedLauncher::new(fixture.storage(), &[]));
    let orchestrator = RunAllOrchestrator::new(
        launcher.clone(),
        fixture.storage().clone(),
        config(&["a", "b", "c"]),
    );

    let mut request = RunAllRequest::new(batch_id, RunScope::All);
    request.modules = Some(vec!["c".into(), "a".into()]);
    let summary = orchestrator.run_all(request).await.unwrap();

    let modules: Vec<_> = summary.results.iter().map(|r| r.module.as_str()).collect();
    assert_eq!(modules, vec!["a", "c"]);
}

#[tokio::test]
async fn case_manager_selection_reaches_the_launcher() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let launcher = Arc::new(ScriptedLauncher::new(fixture.storage(), &[]));
    let orchestrator =
        RunAllOrchestrator::new(launcher.clone(), fixture.storage().clone(), config(&["a"]));

    let selection = CaseManagerSelection {
        key: "jane_r".into(),
        label: "Jane R".into(),
    };
    let mut request = RunAllRequest::new(batch_id.clone(), RunScope::CaseManager);
    request.case_manager = Some(selection.clone());
    orchestrator.run_all(request).await.unwrap();

    let mut request = RunAllRequest::new(batch_id, RunScope::All);
    request.case_manager = Some(selection.clone());
    orchestrator.run_all(request).await.unwrap();

    let requests = launcher.requests();
    assert_eq!(requests[0].scope, RunScope::CaseManager);
    assert_eq!(requests[0].case_manager.as_ref(), Some(&selection));
    assert_eq!(requests[0].batch_id.as_str(), requests[1].batch_id.as_str());
    assert!(requests[1].case_manager.is_none());
}

#[tokio::test]
async fn invalid_requests_start_nothing() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let launcher = Arc::new(ScriptedLauncher::new(fixture.storage(), &[]));
    let orchestrator = RunAllOrchestrator::new(
        launcher.clone(),
        fixture.storage().clone(),
        config(&["a", "b"]),
    );

    let err = orchestrator
        .run_all(RunAllRequest::new("not-a-uuid", RunScope::All))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidBatch(_)));

    let err = orchestrator
        .run_all(RunAllRequest::new(
            "6f1c2e9a-0000-4000-8000-000000000000",
            RunScope::All,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidBatch(_)));

    let err = orchestrator
        .run_all(RunAllRequest::new(batch_id.clone(), RunScope::CaseManager))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingCaseManager));

    let mut request = RunAllRequest::new(batch_id.clone(), RunScope::All);
    request.modules = Some(vec!["a".into(), "zzz".into()]);
    match orchestrator.run_all(request).await.unwrap_err() {
        OrchestratorError::UnknownModules(unknown) => assert_eq!(unknown, vec!["zzz"]),
        other => panic!("unexpected {:?}", other),
    }

    let empty = RunAllOrchestrator::new(launcher.clone(), fixture.storage().clone(), config(&[]));
    let err = empty
        .run_all(RunAllRequest::new(batch_id, RunScope::All))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoModules));

    assert!(launcher.events().is_empty());
}

#[tokio::test]
async fn crashed_analyzer_fails_without_waiting_for_the_timeout() {
    let fixture = StorageFixture::new();
    let batch_id = staged_batch(&fixture);
    let launcher = Arc::new(ScriptedLauncher::new(
        fixture.storage(),
        &[("crashy", Behavior::Crash(3)), ("after", Behavior::DoneNow)],
    ));
    let mut config = config(&["crashy", "after"]);
    config.module_timeout = Duration::from_secs(30);
    let orchestrator = RunAllOrchestrator::new(launcher, fixture.storage().clone(), config);

    let summary = orchestrator
        .run_all(RunAllRequest::new(batch_id, RunScope::All))
        .await
        .unwrap();

    let crashed = &summary.results[0];
    assert_eq!(crashed.outcome, ModuleOutcome::Failed);
    assert!(crashed.run_id.is_some());
    assert!(crashed.elapsed_ms < 5_000);
    let message = crashed.message.as_deref().unwrap();
    assert!(message.contains("exit code 3"), "{}", message);
    assert!(message.contains("fatal: cannot open workbook"), "{}", message);
    assert_eq!(summary.results[1].outcome, ModuleOutcome::Succeeded);
    assert!(!summary.run_ids.contains_key("crashy"));
}
