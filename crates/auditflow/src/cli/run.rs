//! `auditflow run` (one module) and `auditflow run-all` (every module, in
//! order).

use crate::cli::case_managers;
use crate::cli::error::HelpfulError;
use crate::cli::output::{colored, format_elapsed_ms, plain, print_json, print_table};
use auditflow::AppContext;
use auditflow_orchestrator::{
    CaseManagerSelection, ModuleOutcome, RunAllRequest, RunLauncher, RunRequest,
};
use auditflow_protocol::{label_from_key, RunScope};
use comfy_table::Color;
use serde_json::json;
use tracing::info;

#[derive(Debug)]
pub struct RunArgs {
    pub module: String,
    pub batch: Option<String>,
    pub scope: Option<RunScope>,
    pub case_manager: Option<String>,
    pub wait: bool,
    pub json: bool,
}

#[derive(Debug)]
pub struct RunAllArgs {
    pub batch: Option<String>,
    pub scope: Option<RunScope>,
    pub case_manager: Option<String>,
    pub modules: Vec<String>,
    pub json: bool,
}

/// An explicit `--case-manager` implies case-manager scope.
fn effective_scope(scope: Option<RunScope>, case_manager: &Option<String>) -> RunScope {
    scope.unwrap_or(if case_manager.is_some() {
        RunScope::CaseManager
    } else {
        RunScope::All
    })
}

/// The requested batch, or the most recently staged one.
async fn resolve_batch(ctx: &AppContext, batch: Option<String>) -> anyhow::Result<String> {
    if let Some(batch) = batch {
        return Ok(batch);
    }
    let batches = ctx.batches();
    let latest = tokio::task::spawn_blocking(move || batches.latest())
        .await?
        .map_err(HelpfulError::from_stage)?;
    match latest {
        Some(batch) => {
            info!(batch_id = %batch.batch_id, "Using most recent batch");
            Ok(batch.batch_id.to_string())
        }
        None => Err(HelpfulError::new("No staged batches found")
            .with_suggestion("TRY: auditflow stage FILE...   # stage a batch first")
            .with_suggestion("TRY: --batch BATCH_ID")
            .into()),
    }
}

/// Label for a key: the directory's spelling when known.
async fn selection_for(
    ctx: &AppContext,
    scope: RunScope,
    key: Option<String>,
) -> anyhow::Result<Option<CaseManagerSelection>> {
    let key = match (scope, key) {
        (RunScope::CaseManager, Some(key)) if !key.trim().is_empty() => key.trim().to_string(),
        _ => return Ok(None),
    };
    let catalog = case_managers::catalog(ctx).await?;
    let label = catalog
        .find(&key)
        .map(|option| option.label.clone())
        .unwrap_or_else(|| label_from_key(&key));
    Ok(Some(CaseManagerSelection { key, label }))
}

pub async fn run_one(ctx: &AppContext, args: RunArgs) -> anyhow::Result<()> {
    let scope = effective_scope(args.scope, &args.case_manager);
    let batch_id = resolve_batch(ctx, args.batch).await?;
    let batches = ctx.batches();
    let batch = tokio::task::spawn_blocking(move || batches.load(&batch_id))
        .await?
        .map_err(HelpfulError::from_stage)?;
    let selection = selection_for(ctx, scope, args.case_manager).await?;
    if scope == RunScope::CaseManager && selection.is_none() {
        return Err(HelpfulError::new("Scope case_manager requires a case manager key")
            .with_suggestion("TRY: auditflow case-managers   # list keys")
            .into());
    }

    let request = RunRequest::new(args.module, scope, batch.batch_id).with_case_manager(selection);
    let launcher = ctx.launcher();

    let launched = if args.wait {
        launcher.run_and_wait(&request).await
    } else {
        launcher.create_run(&request).await
    }
    .map_err(HelpfulError::from_launch)?;

    let status = if args.wait {
        let runs = ctx.runs();
        let run_id = launched.run_id.to_string();
        tokio::task::spawn_blocking(move || runs.get(&run_id).ok())
            .await?
            .map(|record| record.status.to_string())
    } else {
        None
    };

    if args.json {
        return print_json(&json!({
            "runId": launched.run_id,
            "pid": launched.pid,
            "module": request.module,
            "scope": request.scope,
            "batchId": request.batch_id,
            "caseManager": request.case_manager,
            "status": status,
        }));
    }

    println!("Run {} ({})", launched.run_id, request.module);
    match status {
        Some(status) => println!("Status: {}", status),
        None => println!("Started; follow with: auditflow status {}", launched.run_id),
    }
    Ok(())
}

pub async fn run_all(ctx: &AppContext, args: RunAllArgs) -> anyhow::Result<()> {
    let scope = effective_scope(args.scope, &args.case_manager);
    let batch_id = resolve_batch(ctx, args.batch).await?;
    let selection = selection_for(ctx, scope, args.case_manager).await?;

    let mut request = RunAllRequest::new(batch_id, scope);
    request.case_manager = selection;
    if !args.modules.is_empty() {
        request.modules = Some(args.modules);
    }

    let summary = ctx
        .orchestrator()
        .run_all(request)
        .await
        .map_err(HelpfulError::from_orchestrator)?;

    if args.json {
        return print_json(&summary);
    }

    let rows = summary
        .results
        .iter()
        .map(|result| {
            let outcome = match result.outcome {
                ModuleOutcome::Succeeded => colored("succeeded", Color::Green),
                ModuleOutcome::Failed => colored("failed", Color::Red),
                ModuleOutcome::TimedOut => colored("timed out", Color::Yellow),
                ModuleOutcome::LaunchFailed => colored("not started", Color::Red),
            };
            vec![
                plain(result.module.clone()),
                outcome,
                plain(result.run_id.clone().unwrap_or_else(|| "-".into())),
                plain(format_elapsed_ms(result.elapsed_ms)),
                plain(result.message.clone().unwrap_or_default()),
            ]
        })
        .collect();
    print_table(&["Module", "Outcome", "Run", "Elapsed", "Message"], rows);
    println!(
        "{} of {} module(s) succeeded for batch {}",
        summary.succeeded, summary.attempted, summary.batch_id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_manager_flag_implies_scope() {
        assert_eq!(effective_scope(None, &None), RunScope::All);
        assert_eq!(
            effective_scope(None, &Some("jane_r".into())),
            RunScope::CaseManager
        );
        assert_eq!(
            effective_scope(Some(RunScope::All), &Some("jane_r".into())),
            RunScope::All
        );
    }
}
