//! Config command - View and create configuration
//!
//! - Show the effective configuration (TOML or JSON)
//! - Create a default local or global config file
//! - Show configuration file paths

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use foldgraph_config::ConfigLoader;
use serde::Serialize;

use super::{load_config, print_info, resolve_workspace};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Create a configuration file with default values
    Init(InitArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create the global config (~/.foldgraph/config.toml) instead of the local one
    #[arg(long)]
    global: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
        ConfigCommand::Path(args) => execute_path(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let config = load_config(&global, &workspace)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to render configuration")?
        );
    }
    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();

    let path = if args.global {
        loader.init_global().context("Failed to create global config")?
    } else {
        let workspace = resolve_workspace(&global)?;
        loader
            .init_local(&workspace)
            .context("Failed to create local config")?
    };

    print_info(&format!("Config ready at {}", path.display()), global.quiet);
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = global
        .config
        .clone()
        .unwrap_or_else(|| loader.local_config_path(&workspace));

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let state = |exists: bool| if exists { "exists" } else { "not found" };
    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), state(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        state(paths.local_exists)
    );
    Ok(())
}
