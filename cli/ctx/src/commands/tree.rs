//! `ctx tree` — show the locked dependency tree.

use anyhow::{bail, Result};
use ctx_resolve::{format_tree, LockFile, ProjectLayout};

use crate::manifest::ContextManifest;

pub fn run(layout: &ProjectLayout, manifest: &ContextManifest) -> Result<()> {
    print!("{}", render(layout, manifest)?);
    Ok(())
}

pub(crate) fn render(layout: &ProjectLayout, manifest: &ContextManifest) -> Result<String> {
    let Some(lock) = LockFile::load(&layout.lock_path())? else {
        bail!("no lock file found (run `ctx install` first)");
    };
    let label = layout
        .root()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let roots = manifest.top_level_identities()?;
    Ok(format_tree(&label, &roots, &lock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_resolve::{InstallOptions, MemoryRemote, MemoryRepo};

    #[test]
    fn tree_after_install() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        crate::commands::init::run(&root).unwrap();
        let layout = ProjectLayout::new(&root);
        crate::commands::add::run(&layout, "x.example/a").unwrap();
        crate::commands::add::run(&layout, "x.example/b").unwrap();
        let manifest = ContextManifest::load(&layout.manifest_path()).unwrap();

        let remote = MemoryRemote::new(layout.packages_dir());
        remote
            .insert(
                "x.example/a",
                MemoryRepo::new()
                    .commit("aaaaaaa", &["x.example/base"])
                    .tag("v1.0.0", "aaaaaaa"),
            )
            .unwrap();
        remote
            .insert(
                "x.example/b",
                MemoryRepo::new()
                    .commit("bbbbbbb", &["x.example/base"])
                    .branch("main", "bbbbbbb"),
            )
            .unwrap();
        remote
            .insert("x.example/base", MemoryRepo::new().tag("v0.4.1", "ccccccc"))
            .unwrap();
        crate::commands::install::install_with(
            &layout,
            &manifest,
            &remote,
            InstallOptions::default(),
        )
        .unwrap();

        let out = render(&layout, &manifest).unwrap();
        assert!(out.starts_with("proj\n"));
        assert!(out.contains("├── x.example/a v1.0.0 @ aaaaaaa\n"));
        assert!(out.contains("│   └── x.example/base v0.4.1 @ ccccccc\n"));
        assert!(out.contains("└── x.example/b @ bbbbbbb\n"));
        assert!(out.contains("    └── x.example/base v0.4.1 @ ccccccc (shared)\n"));
    }

    #[test]
    fn tree_without_lock_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(render(&layout, &ContextManifest::default()).is_err());
    }
}
