//! ctx — install and pin context sources from git repositories.

mod commands;
mod manifest;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use ctx_resolve::ProjectLayout;
use tracing_subscriber::prelude::*;

use manifest::ContextManifest;

#[derive(Parser)]
#[command(name = "ctx", version, about = "Install and pin context sources from git repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .context/ in the current directory
    Init,
    /// Add a context source to .context/manifest.toml
    Add {
        /// Source requirement (e.g. github.com/org/repo@^1.0)
        source: String,
    },
    /// Resolve and check out every source, updating .context/lock.toml
    Install {
        /// Check out exactly what .context/lock.toml records
        #[arg(long)]
        frozen: bool,
        /// Fail when a dependency declared late is not satisfied
        #[arg(long)]
        strict: bool,
    },
    /// Show locked sources
    Status,
    /// Show the locked dependency tree
    Tree,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Log to stderr, filtered by `CTX_LOG` (default `warn`).
fn init_tracing() {
    let env_layer = tracing_subscriber::EnvFilter::try_from_env("CTX_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let format_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_layer)
        .with(format_layer)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init => commands::init::run(&cwd),

        Commands::Add { source } => {
            let (_, layout) = load_manifest_required(&cwd)?;
            commands::add::run(&layout, &source).map(|_| ())
        }

        Commands::Install { frozen, strict } => {
            let (manifest, layout) = load_manifest_required(&cwd)?;
            commands::install::run(&layout, &manifest, frozen, strict)
        }

        Commands::Status => {
            let (manifest, layout) = load_manifest_required(&cwd)?;
            commands::status::run(&layout, &manifest)
        }

        Commands::Tree => {
            let (manifest, layout) = load_manifest_required(&cwd)?;
            commands::tree::run(&layout, &manifest)
        }
    }
}

/// Load manifest, returning error if not found.
fn load_manifest_required(cwd: &Path) -> anyhow::Result<(ContextManifest, ProjectLayout)> {
    match ContextManifest::find_and_load(cwd)? {
        Some(found) => Ok(found),
        None => anyhow::bail!("no .context/manifest.toml found (run `ctx init` first)"),
    }
}
