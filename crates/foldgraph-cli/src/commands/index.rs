//! Index command - Pre-compute edge buckets for a local namespace

use anyhow::{Context, Result};
use clap::Args;
use foldgraph_backend::{BucketIndexBuilder, IndexStats};
use tracing::info;

use super::{local_backend, print_info, workspace_and_config};
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the index command
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Delete existing bucket files instead of merging into them
    #[arg(long)]
    pub clean: bool,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the index command
pub async fn execute(args: IndexArgs, global: GlobalOptions) -> Result<()> {
    let (workspace, config) = workspace_and_config(&global)?;
    let backend = local_backend(&config, &workspace, "index")?;
    let quiet = global.quiet || args.json;

    print_info(
        &format!("Indexing {}", backend.namespace_dir().display()),
        quiet,
    );
    let pb = progress::spinner("Scanning namespace...", quiet);
    let clean = args.clean;

    let spinner = pb.clone();
    let result = tokio::task::spawn_blocking(move || {
        BucketIndexBuilder::new(&backend)
            .clean(clean)
            .build_with_progress(|rel| progress::update(&spinner, format!("Scanning {}", rel)))
    })
    .await
    .context("Index task panicked")?;

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            progress::finish_spinner_error(pb, "Indexing failed");
            return Err(e).context("Failed to build bucket index");
        }
    };

    if stats.links_found == 0 {
        progress::finish_spinner_warn(
            pb,
            &format!("No links found in {} files", stats.files_scanned),
        );
    } else {
        progress::finish_spinner(pb, &summary(&stats));
    }
    info!(
        files = stats.files_scanned,
        links = stats.links_found,
        buckets = stats.buckets_written,
        "Index complete"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "files_scanned": stats.files_scanned,
                "links_found": stats.links_found,
                "records_written": stats.records_written,
                "buckets_written": stats.buckets_written,
                "buckets_removed": stats.buckets_removed,
            }))?
        );
    }
    Ok(())
}

fn summary(stats: &IndexStats) -> String {
    let mut text = format!(
        "Indexed {} files: {} links, {} records in {} buckets",
        stats.files_scanned, stats.links_found, stats.records_written, stats.buckets_written
    );
    if stats.buckets_removed > 0 {
        text.push_str(&format!(" ({} stale buckets removed)", stats.buckets_removed));
    }
    text
}
