//! `ctx init` — project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ctx_resolve::ProjectLayout;

use crate::manifest::ContextManifest;

/// Scaffold `.context/` in `project_dir`. Existing files are left alone.
pub fn run(project_dir: &Path) -> Result<()> {
    let layout = ProjectLayout::new(project_dir);
    fs::create_dir_all(layout.context_dir()).context("creating .context/ directory")?;

    let manifest_path = layout.manifest_path();
    if !manifest_path.exists() {
        fs::write(&manifest_path, ContextManifest::template())
            .context("writing .context/manifest.toml")?;
        println!("✓ Created .context/manifest.toml");
    }

    let gitignore = layout.context_dir().join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, "locks/\n*.tmp\n").context("writing .context/.gitignore")?;
        println!("✓ Created .context/.gitignore");
    }
    Ok(())
}
