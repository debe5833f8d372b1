//! Link command - Add a pre-computed edge to both node records

use anyhow::{Context, Result};
use clap::Args;

use super::{local_backend, print_info, workspace_and_config};
use crate::GlobalOptions;

/// Arguments for the link command
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Source node ID
    pub source: String,

    /// Target node ID
    pub target: String,
}

/// Execute the link command
pub async fn execute(args: LinkArgs, global: GlobalOptions) -> Result<()> {
    let (workspace, config) = workspace_and_config(&global)?;
    let backend = local_backend(&config, &workspace, "link")?;

    backend
        .add_edge(&args.source, &args.target)
        .await
        .with_context(|| format!("Failed to link {} -> {}", args.source, args.target))?;

    print_info(
        &format!("Linked {} -> {}", args.source, args.target),
        global.quiet,
    );
    Ok(())
}
