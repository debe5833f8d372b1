//! View command - Load the namespace and print the visible graph
//!
//! Loads the root, applies the requested expansions and collapses, and prints
//! the visible tree followed by the aggregated edges.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use foldgraph_core::{EngineOptions, GraphEngine, GraphStore, RecomputeOutcome, Status};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use super::workspace_and_config;
use crate::GlobalOptions;

/// Arguments for the view command
#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Directory to expand (repeatable, applied in order)
    #[arg(long = "expand", short = 'e', value_name = "ID")]
    pub expand: Vec<String>,

    /// Directory to collapse after the expansions (repeatable, applied in order)
    #[arg(long = "collapse", value_name = "ID")]
    pub collapse: Vec<String>,

    /// Node to select and highlight
    #[arg(long, value_name = "ID")]
    pub select: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One visible node in the printed tree
#[derive(Debug, Clone, Serialize)]
pub struct ViewNode {
    pub id: String,
    pub kind: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    pub highlighted: bool,
}

/// Aggregated edge in the printed graph
#[derive(Debug, Clone, Serialize)]
pub struct ViewEdge {
    pub source: String,
    pub target: String,
}

/// Everything the view command prints
#[derive(Debug, Clone, Serialize)]
pub struct ViewReport {
    pub root: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

/// Execute the view command
pub async fn execute(args: ViewArgs, global: GlobalOptions) -> Result<()> {
    let (workspace, config) = workspace_and_config(&global)?;
    let service = foldgraph_backend::create_service(&config, &workspace)
        .context("Failed to create namespace service")?;

    let root = config.namespace.root_id.clone();
    let engine = GraphEngine::with_options(
        Arc::new(RwLock::new(GraphStore::new())),
        service,
        EngineOptions::default().with_root_prefix(&root),
    );

    log_outcome("load", engine.load_root(&root).await?);
    for id in &args.expand {
        let outcome = engine
            .expand(id)
            .await
            .with_context(|| format!("Cannot expand {}", id))?;
        log_outcome("expand", outcome);
    }
    for id in &args.collapse {
        let outcome = engine
            .collapse(id)
            .await
            .with_context(|| format!("Cannot collapse {}", id))?;
        log_outcome("collapse", outcome);
    }

    let selected = match args.select {
        Some(ref id) => Some(
            engine
                .select(id)
                .with_context(|| format!("Cannot select {}", id))?,
        ),
        None => None,
    };

    let report = build_report(&engine, &root, selected);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Status::Degraded { reason, .. } = engine.status() {
        if !global.quiet {
            eprintln!("warning: edges are partial ({})", reason);
        }
    }
    Ok(())
}

fn log_outcome(step: &str, outcome: RecomputeOutcome) {
    match outcome {
        RecomputeOutcome::Committed(summary) => debug!(
            step,
            passes = summary.passes,
            edges = summary.edges,
            "Recompute committed"
        ),
        RecomputeOutcome::Coalesced => debug!(step, "Recompute coalesced"),
    }
}

/// Walk the visible tree depth-first from the root.
pub fn build_report(engine: &GraphEngine, root: &str, selected: Option<String>) -> ViewReport {
    let (mut nodes, edges) = {
        let store = engine.store();
        let store = store.read();

        let mut nodes = Vec::new();
        let mut stack: Vec<(String, usize)> = vec![(root.to_string(), 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = store.get_node(&id) else {
                continue;
            };
            if !node.is_visible() {
                continue;
            }

            nodes.push(ViewNode {
                id: node.id.clone(),
                kind: node.kind.as_str().to_string(),
                depth,
                expanded: node.is_directory().then_some(false),
                highlighted: node.highlighted,
            });

            // Reverse so the sorted children pop in order
            for child in store.children(&id).into_iter().rev() {
                stack.push((child.id.clone(), depth + 1));
            }
        }

        let mut edges: Vec<ViewEdge> = store
            .links()
            .map(|e| ViewEdge {
                source: e.source,
                target: e.target,
            })
            .collect();
        edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        (nodes, edges)
    };

    // Directory states live behind the loader lock; read them with the store released
    for node in nodes.iter_mut().filter(|n| n.expanded.is_some()) {
        node.expanded = Some(engine.directory_state(&node.id).is_some_and(|s| s.expanded));
    }

    ViewReport {
        root: root.to_string(),
        status: engine.status().to_string(),
        selected,
        nodes,
        edges,
    }
}

fn print_report(report: &ViewReport) {
    for node in &report.nodes {
        let marker = match node.expanded {
            Some(true) => "▾ ",
            Some(false) => "▸ ",
            None => "  ",
        };
        let name = foldgraph_core::namespace::local_name(&node.id);
        let highlight = if node.highlighted { "  *" } else { "" };
        println!("{}{}{}{}", "  ".repeat(node.depth), marker, name, highlight);
    }

    println!();
    if report.edges.is_empty() {
        println!("No edges");
    } else {
        println!("Edges ({})", report.edges.len());
        for edge in &report.edges {
            println!("  {} -> {}", edge.source, edge.target);
        }
    }

    println!();
    println!("{}", report.status);
    if let Some(ref selected) = report.selected {
        println!("Selected: {}", selected);
    }
}
