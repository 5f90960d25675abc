//! The process launcher against a real shell analyzer.
#![cfg(unix)]

use auditflow_ids::BatchId;
use auditflow_orchestrator::{
    AnalyzerCommand, CaseManagerSelection, LaunchError, ModuleOutcome, OrchestratorConfig,
    ProcessLauncher, RunAllOrchestrator, RunAllRequest, RunRequest,
};
use auditflow_protocol::{FileKind, RunScope};
use auditflow_test_utils::StorageFixture;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn shell(script: &str) -> AnalyzerCommand {
    AnalyzerCommand::new("sh").with_args(["-c", script])
}

#[tokio::test]
async fn waits_and_captures_output_in_run_log() {
    let fixture = StorageFixture::new();
    let launcher = ProcessLauncher::new(
        fixture.storage().clone(),
        shell("echo \"module={module}\"; echo \"key=$AUDITFLOW_CASE_MANAGER_KEY\" >&2"),
    );
    let request = RunRequest::new("intake_audit", RunScope::CaseManager, BatchId::new())
        .with_case_manager(Some(CaseManagerSelection {
            key: "jane_r".into(),
            label: "Jane R".into(),
        }));

    let launched = launcher.run_and_wait(&request).await.unwrap();

    let storage = fixture.storage();
    assert!(storage.run_artifacts_dir(&launched.run_id).is_dir());
    let log = fs::read_to_string(storage.run_log(&launched.run_id)).unwrap();
    assert!(log.contains("module=intake_audit"));
    assert!(log.contains("key=jane_r"));
    assert!(!storage.run_manifest(&launched.run_id).exists());
}

#[tokio::test]
async fn non_zero_exit_carries_code_and_log_tail() {
    let fixture = StorageFixture::new();
    let launcher = ProcessLauncher::new(
        fixture.storage().clone(),
        shell("echo 'roster column missing'; exit 3"),
    );
    let request = RunRequest::new("intake_audit", RunScope::All, BatchId::new());

    match launcher.run_and_wait(&request).await.unwrap_err() {
        LaunchError::ExternalFailure {
            code, diagnostics, ..
        } => {
            assert_eq!(code, Some(3));
            assert!(diagnostics.contains("roster column missing"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn unconfigured_and_missing_programs_fail_cleanly() {
    let fixture = StorageFixture::new();
    let request = RunRequest::new("m", RunScope::All, BatchId::new());

    let launcher = ProcessLauncher::new(fixture.storage().clone(), AnalyzerCommand::default());
    assert!(matches!(
        launcher.run_and_wait(&request).await,
        Err(LaunchError::NotConfigured)
    ));

    let launcher = ProcessLauncher::new(
        fixture.storage().clone(),
        AnalyzerCommand::new("/nonexistent/auditflow-analyzer"),
    );
    assert!(matches!(
        launcher.run_and_wait(&request).await,
        Err(LaunchError::Spawn { .. })
    ));
}

#[tokio::test]
async fn run_all_drives_a_detached_analyzer() {
    let fixture = StorageFixture::new();
    let batch = fixture.write_batch(&[(FileKind::TabularData, "roster.csv", b"Name\nJane\n")]);
    let script = "test -f \"$AUDITFLOW_BATCH_DIR/batch.json\" || exit 1; \
                  printf '{\"status\":\"done\",\"module\":\"%s\"}' \"$AUDITFLOW_MODULE\" \
                  > \"$AUDITFLOW_RUN_DIR/manifest.json.tmp\" && \
                  mv \"$AUDITFLOW_RUN_DIR/manifest.json.tmp\" \"$AUDITFLOW_RUN_DIR/manifest.json\"";
    let launcher = Arc::new(ProcessLauncher::new(fixture.storage().clone(), shell(script)));
    let orchestrator = RunAllOrchestrator::new(
        launcher,
        fixture.storage().clone(),
        OrchestratorConfig {
            modules: vec!["intake_audit".into(), "summary".into()],
            poll_interval: Duration::from_millis(20),
            module_timeout: Duration::from_secs(20),
            log_markers: None,
        },
    );

    let summary = orchestrator
        .run_all(RunAllRequest::new(batch.batch_id, RunScope::All))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert!(summary
        .results
        .iter()
        .all(|result| result.outcome == ModuleOutcome::Succeeded));
}

#[tokio::test]
async fn run_all_reports_an_analyzer_crash_as_failed() {
    let fixture = StorageFixture::new();
    let batch = fixture.write_batch(&[(FileKind::TabularData, "roster.csv", b"Name\nJane\n")]);
    let launcher = Arc::new(ProcessLauncher::new(
        fixture.storage().clone(),
        shell("echo 'fatal: cannot open workbook'; exit 3"),
    ));
    let orchestrator = RunAllOrchestrator::new(
        launcher,
        fixture.storage().clone(),
        OrchestratorConfig {
            modules: vec!["intake_audit".into()],
            poll_interval: Duration::from_millis(20),
            module_timeout: Duration::from_secs(60),
            log_markers: None,
        },
    );

    let summary = orchestrator
        .run_all(RunAllRequest::new(batch.batch_id, RunScope::All))
        .await
        .unwrap();

    let result = &summary.results[0];
    assert_eq!(result.outcome, ModuleOutcome::Failed);
    assert!(result.elapsed_ms < 10_000);
    let message = result.message.as_deref().unwrap();
    assert!(message.contains("exit code 3"), "{}", message);
    assert!(message.contains("fatal: cannot open workbook"), "{}", message);
}
