//! Edges command - Show the stored edge record of a node

use anyhow::{Context, Result};
use clap::Args;
use foldgraph_backend::RemoteBackend;
use foldgraph_config::BackendType;
use foldgraph_core::{bucket_id, EdgeRecord};

use super::{local_backend, workspace_and_config};
use crate::GlobalOptions;

/// Arguments for the edges command
#[derive(Args, Debug)]
pub struct EdgesArgs {
    /// Node ID (e.g., "Notebook/Projects/plan.md")
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the edges command
pub async fn execute(args: EdgesArgs, global: GlobalOptions) -> Result<()> {
    let (workspace, config) = workspace_and_config(&global)?;

    let record = match config.backend.backend_type {
        BackendType::Local => local_backend(&config, &workspace, "edges")?
            .read_record(&args.id)
            .await
            .with_context(|| format!("Failed to read record of {}", args.id))?,
        BackendType::Remote => {
            let remote = config
                .backend
                .remote
                .as_ref()
                .context("Missing [backend.remote] configuration")?;
            RemoteBackend::from_config(remote, &config.namespace.root_id)?
                .read_record(&args.id)
                .await
                .with_context(|| format!("Failed to fetch record of {}", args.id))?
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": args.id,
                "edgesFrom": record.edges_from,
                "edgesTo": record.edges_to,
            }))?
        );
    } else {
        print!("{}", render(&args.id, &record));
    }
    Ok(())
}

fn render(id: &str, record: &EdgeRecord) -> String {
    let mut out = format!("{} (bucket {})\n", id, bucket_id(id));
    for (title, list) in [("Outgoing", &record.edges_from), ("Incoming", &record.edges_to)] {
        out.push_str(&format!("\n{} ({})\n", title, list.len()));
        for other in list {
            out.push_str(&format!("  {}\n", other));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let record = EdgeRecord::new(vec!["Notebook/b.md".to_string()], Vec::new());
        let text = render("Notebook/a.md", &record);
        assert!(text.starts_with("Notebook/a.md (bucket a)\n"));
        assert!(text.contains("Outgoing (1)\n  Notebook/b.md\n"));
        assert!(text.contains("Incoming (0)\n"));
    }
}
