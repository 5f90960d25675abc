//! `auditflow status`, `auditflow log` and `auditflow runs`.

use crate::cli::error::HelpfulError;
use crate::cli::output::{colored, format_optional_timestamp, format_timestamp, plain, print_json, print_table};
use auditflow::AppContext;
use auditflow_protocol::{RunRecord, RunStatus};
use comfy_table::Color;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Running => Color::Cyan,
        RunStatus::Done => Color::Green,
        RunStatus::Error => Color::Red,
    }
}

pub fn status(ctx: &AppContext, run_id: &str, json: bool) -> anyhow::Result<()> {
    let record = ctx
        .runs()
        .get(run_id)
        .map_err(HelpfulError::from_run_store)?;
    if json {
        return print_json(&record);
    }

    println!("Run:       {}", record.run_id);
    println!("Module:    {}", record.module);
    println!("Scope:     {}", record.scope);
    if let Some(key) = &record.selection.case_manager_key {
        let name = record.selection.case_manager_name.as_deref().unwrap_or(key);
        println!("Selection: {} ({})", name, key);
    }
    println!("Status:    {}", record.status);
    println!("Started:   {}", format_timestamp(&record.started_at));
    println!(
        "Finished:  {}",
        format_optional_timestamp(record.finished_at.as_ref())
    );
    if let Some(error) = &record.error {
        println!("Error:     {}", error);
    }
    let outputs = &record.outputs;
    for path in outputs.xlsx.iter().chain(outputs.xlsx_list.iter()) {
        println!("Workbook:  {}", path);
    }
    if let Some(pdf) = &outputs.pdf {
        println!("Document:  {}", pdf);
    }
    if let Some(url) = &outputs.sheet_url {
        println!("Sheet:     {}", url);
    }
    if let Some(url) = &outputs.form_url {
        println!("Form:      {}", url);
    }
    Ok(())
}

pub fn log(ctx: &AppContext, run_id: &str, tail: Option<usize>, json: bool) -> anyhow::Result<()> {
    let store = ctx.runs();
    let text = match tail {
        Some(lines) => store.log_tail(run_id, lines),
        None => store.get_log(run_id),
    }
    .map_err(HelpfulError::from_run_store)?;

    if json {
        return print_json(&json!({ "runId": run_id, "log": text }));
    }
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunsOutput {
    total: usize,
    runs: Vec<RunRecord>,
}

pub fn list(ctx: &AppContext, limit: usize, json: bool) -> anyhow::Result<()> {
    let store = ctx.runs();
    let ids = store.list().map_err(HelpfulError::from_run_store)?;
    let total = ids.len();

    let mut runs = Vec::new();
    for run_id in ids.iter().take(limit) {
        match store.get(run_id.as_str()) {
            Ok(record) => runs.push(record),
            Err(err) => warn!(run_id = %run_id, error = %err, "Skipping unreadable run"),
        }
    }

    if json {
        return print_json(&RunsOutput { total, runs });
    }
    if runs.is_empty() {
        println!("No runs yet.");
        return Ok(());
    }

    let rows = runs
        .iter()
        .map(|record| {
            vec![
                plain(record.run_id.clone()),
                plain(record.module.clone()),
                plain(record.scope.as_str()),
                colored(record.status.as_str(), status_color(record.status)),
                plain(format_timestamp(&record.started_at)),
            ]
        })
        .collect();
    print_table(&["Run", "Module", "Scope", "Status", "Started"], rows);
    if total > runs.len() {
        println!("Showing {} of {} runs (use --limit)", runs.len(), total);
    }
    Ok(())
}
