//! `auditflow case-managers`

use crate::cli::output::{colored, plain, print_json, print_table};
use anyhow::Context;
use auditflow::AppContext;
use auditflow_directory::{Catalog, OptionKind};
use comfy_table::Color;

pub async fn catalog(ctx: &AppContext) -> anyhow::Result<Catalog> {
    let directory = ctx
        .directory()
        .context("Failed to configure case manager sources")?;
    Ok(directory.list().await)
}

pub async fn run(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let catalog = catalog(ctx).await?;
    if json {
        return print_json(&catalog);
    }

    let rows = catalog
        .special
        .iter()
        .chain(catalog.normal.iter())
        .map(|option| {
            let label = match option.kind {
                OptionKind::Special => colored(option.label.clone(), Color::Yellow),
                OptionKind::Normal => plain(option.label.clone()),
            };
            vec![
                plain(option.key.clone()),
                label,
                plain(option.filename.clone()),
                if option.exists {
                    colored("yes", Color::Green)
                } else {
                    plain("no")
                },
            ]
        })
        .collect();
    print_table(&["Key", "Label", "Output file", "Exists"], rows);

    match &catalog.meta.source {
        Some(source) => println!(
            "{} roster entries from {}",
            catalog.meta.roster_count, source
        ),
        None => println!("No roster source returned entries"),
    }
    if !catalog.meta.scanned_keys.is_empty() {
        println!(
            "{} key(s) found only in existing outputs",
            catalog.meta.scanned_keys.len()
        );
    }
    for attempt in &catalog.meta.sources_tried {
        if let Some(error) = &attempt.error {
            eprintln!("warning: {} failed: {}", attempt.source, error);
        }
    }
    Ok(())
}
