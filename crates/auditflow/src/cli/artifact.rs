//! `auditflow artifact RUN_ID`

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, print_json};
use anyhow::Context;
use auditflow::AppContext;
use auditflow_runs::ArtifactResponse;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct ArtifactArgs {
    pub run_id: String,
    pub format: String,
    pub file: Option<String>,
    pub out: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactOutput {
    run_id: String,
    artifact: ArtifactResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<PathBuf>,
}

pub async fn run(ctx: &AppContext, args: ArtifactArgs) -> anyhow::Result<()> {
    let resolver = ctx.artifacts();
    let (run_id, format, file) = (args.run_id.clone(), args.format.clone(), args.file.clone());
    let response = tokio::task::spawn_blocking(move || {
        resolver.resolve_named(&run_id, &format, file.as_deref())
    })
    .await?
    .map_err(HelpfulError::from_artifact)?;

    let saved_to = match (&response, &args.out) {
        (ArtifactResponse::File(artifact), Some(out)) => {
            let target = target_path(out, &artifact.filename);
            let mut source = artifact
                .open()
                .await
                .with_context(|| format!("Failed to open {}", artifact.path.display()))?;
            let mut dest = tokio::fs::File::create(&target)
                .await
                .with_context(|| format!("Failed to create {}", target.display()))?;
            tokio::io::copy(&mut source, &mut dest)
                .await
                .with_context(|| format!("Failed to write {}", target.display()))?;
            Some(target)
        }
        _ => None,
    };

    if args.json {
        return print_json(&ArtifactOutput {
            run_id: args.run_id,
            artifact: response,
            saved_to,
        });
    }

    match &response {
        ArtifactResponse::Redirect { url } => println!("{}", url),
        ArtifactResponse::File(artifact) => {
            println!("File:         {}", artifact.filename);
            println!("Content-Type: {}", artifact.content_type);
            println!("Size:         {}", format_size(artifact.size));
            match &saved_to {
                Some(target) => println!("Saved to:     {}", target.display()),
                None => println!("Path:         {}", artifact.path.display()),
            }
        }
    }
    Ok(())
}

/// Directories receive the artifact under its own filename.
fn target_path(out: &Path, filename: &str) -> PathBuf {
    if out.is_dir() {
        out.join(filename)
    } else {
        out.to_path_buf()
    }
}
