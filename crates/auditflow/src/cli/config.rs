//! `auditflow config`: resolved paths and effective settings.

use crate::cli::output::print_json;
use auditflow::AppContext;
use serde_json::json;
use std::path::Path;

fn path_entry(path: &Path) -> serde_json::Value {
    json!({
        "path": path.to_string_lossy(),
        "exists": path.exists(),
    })
}

pub fn run(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let storage = &ctx.storage;
    let config = &ctx.config;

    if json {
        return print_json(&json!({
            "home": ctx.home.to_string_lossy(),
            "configFile": path_entry(&ctx.config_path),
            "logs": path_entry(&ctx.logs_dir()),
            "storage": {
                "root": path_entry(storage.root()),
                "uploads": path_entry(&storage.uploads_dir()),
                "runs": path_entry(&storage.runs_dir()),
                "outputs": path_entry(storage.outputs_dir()),
            },
            "limits": config.limits,
            "analyzer": config.analyzer,
            "orchestrator": config.orchestrator,
            "directory": config.directory,
        }));
    }

    let mark = |path: &Path| if path.exists() { "" } else { "  (missing)" };
    println!("Home:       {}", ctx.home.display());
    println!(
        "Config:     {}{}",
        ctx.config_path.display(),
        mark(&ctx.config_path)
    );
    println!("Logs:       {}", ctx.logs_dir().display());
    println!("Storage:    {}{}", storage.root().display(), mark(storage.root()));
    println!("Uploads:    {}", storage.uploads_dir().display());
    println!("Runs:       {}", storage.runs_dir().display());
    println!("Outputs:    {}", storage.outputs_dir().display());
    println!();
    println!(
        "Limits:     {} files, {} bytes per file, {} bytes total",
        config.limits.max_files, config.limits.max_file_bytes, config.limits.max_total_bytes
    );
    if config.analyzer.is_configured() {
        println!(
            "Analyzer:   {} {}",
            config.analyzer.program,
            config.analyzer.args.join(" ")
        );
    } else {
        println!("Analyzer:   (not configured)");
    }
    if config.orchestrator.modules.is_empty() {
        println!("Modules:    (none)");
    } else {
        println!("Modules:    {}", config.orchestrator.modules.join(", "));
    }
    Ok(())
}
