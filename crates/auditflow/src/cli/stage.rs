//! `auditflow stage FILE...`

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, plain, print_json, print_table};
use anyhow::Context;
use auditflow::AppContext;
use auditflow_intake::UploadFile;
use auditflow_protocol::StagedFile;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug)]
pub struct StageArgs {
    pub files: Vec<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StageOutput {
    batch_id: String,
    batch_dir: PathBuf,
    total_bytes: u64,
    saved_files: Vec<StagedFile>,
}

pub async fn run(ctx: &AppContext, args: StageArgs) -> anyhow::Result<()> {
    ctx.ensure_storage()
        .with_context(|| format!("Failed to create storage at {}", ctx.storage.root().display()))?;

    let mut uploads = Vec::with_capacity(args.files.len());
    for path in &args.files {
        if !path.is_file() {
            return Err(HelpfulError::file_not_found(path).into());
        }
        let upload = UploadFile::from_path(path)
            .await
            .map_err(HelpfulError::from_stage)?;
        uploads.push(upload);
    }

    let batch = ctx
        .stager()
        .stage(uploads)
        .await
        .map_err(HelpfulError::from_stage)?;

    let output = StageOutput {
        batch_id: batch.batch_id.to_string(),
        batch_dir: batch.root.clone(),
        total_bytes: batch.manifest.total_bytes,
        saved_files: batch.manifest.files,
    };

    if args.json {
        return print_json(&output);
    }

    println!("Staged batch {}", output.batch_id);
    let rows = output
        .saved_files
        .iter()
        .map(|file| {
            vec![
                plain(file.original_name.clone()),
                plain(file.saved_name.clone()),
                plain(file.kind.as_str()),
                plain(format_size(file.byte_size)),
            ]
        })
        .collect();
    print_table(&["Original", "Saved as", "Kind", "Size"], rows);
    println!(
        "{} file(s), {} in {}",
        output.saved_files.len(),
        format_size(output.total_bytes),
        output.batch_dir.display()
    );
    Ok(())
}
