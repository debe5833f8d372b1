//! FoldGraph CLI - Collapsible namespace graphs
//!
//! A command-line interface for building edge buckets from a namespace and
//! exploring its graph with directories expanded or collapsed.
//!
//! # Usage
//!
//! ```bash
//! # Pre-compute edge buckets
//! foldgraph index
//!
//! # Show the graph with one directory expanded
//! foldgraph view --expand Notebook/Projects
//!
//! # Inspect the stored record of a node
//! foldgraph edges Notebook/Projects/plan.md
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use foldgraph_config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// FoldGraph - Collapsible namespace graphs with aggregated edges
#[derive(Parser, Debug)]
#[command(name = "foldgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory (defaults to the current directory)
    #[arg(long, short = 'w', global = true, env = "FOLDGRAPH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "FOLDGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Namespace server URL (switches to the remote backend)
    #[arg(long, global = true, env = "FOLDGRAPH_REMOTE_URL")]
    remote_url: Option<String>,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> foldgraph_config::ConfigOverrides {
        foldgraph_config::ConfigOverrides {
            remote_url: self.remote_url.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build edge bucket files from the namespace
    Index(commands::index::IndexArgs),

    /// Load the namespace and print the visible graph
    View(commands::view::ViewArgs),

    /// Show the stored edge record of a node
    Edges(commands::edges::EdgesArgs),

    /// Add a pre-computed edge between two nodes
    Link(commands::link::LinkArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Install the stderr subscriber.
///
/// `--quiet`/`--verbose` win over the configured level.
fn init_tracing(global: &GlobalOptions, logging: &LoggingConfig) -> Result<()> {
    let level = if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        Level::from_str(&logging.level).unwrap_or(Level::INFO)
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config when it loads; a broken config is
    // reported by the command itself
    let logging = commands::resolve_workspace(&cli.global)
        .and_then(|ws| commands::load_config(&cli.global, &ws))
        .map(|config| config.logging)
        .unwrap_or_default();
    init_tracing(&cli.global, &logging)?;

    match cli.command {
        Commands::Index(args) => commands::index::execute(args, cli.global).await,
        Commands::View(args) => commands::view::execute(args, cli.global).await,
        Commands::Edges(args) => commands::edges::execute(args, cli.global).await,
        Commands::Link(args) => commands::link::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
