//! `ctx add <source>` — append a source to the manifest.

use anyhow::{Context, Result};
use ctx_resolve::{ProjectLayout, SourceSpec};

/// Add `source` to `sources` unless it is already listed. Returns whether
/// the manifest changed.
pub fn run(layout: &ProjectLayout, source: &str) -> Result<bool> {
    let spec = SourceSpec::parse(source).with_context(|| format!("invalid source '{source}'"))?;
    let source = spec.to_string();

    let manifest_path = layout.manifest_path();
    let content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let mut doc: toml::Table = content.parse().context("parsing manifest.toml")?;

    let sources = doc
        .entry("sources")
        .or_insert_with(|| toml::Value::Array(Vec::new()));
    let toml::Value::Array(list) = sources else {
        anyhow::bail!("`sources` in manifest.toml must be an array");
    };
    if list.iter().any(|v| v.as_str() == Some(source.as_str())) {
        println!("Already present in manifest.");
        return Ok(false);
    }
    list.push(toml::Value::String(source.clone()));

    std::fs::write(&manifest_path, doc.to_string())
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    println!("✓ Added to manifest: {source}");
    println!("Run: ctx install");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ContextManifest;

    fn project() -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        crate::commands::init::run(dir.path()).unwrap();
        let layout = ProjectLayout::new(dir.path());
        (dir, layout)
    }

    #[test]
    fn add_appends_and_keeps_settings() {
        let (_dir, layout) = project();
        assert!(run(&layout, "github.com/org/ctx-a@^1.0").unwrap());
        assert!(run(&layout, " github.com/org/ctx-b ").unwrap());

        let manifest = ContextManifest::load(&layout.manifest_path()).unwrap();
        assert_eq!(manifest.sources, vec!["github.com/org/ctx-a@^1.0", "github.com/org/ctx-b"]);
        assert_eq!(manifest.install.timeout_secs, 60);
    }

    #[test]
    fn add_keeps_fresh_manifest_settings() {
        let (_dir, layout) = project();
        std::fs::write(
            layout.manifest_path(),
            "sources = []\n\n[overrides]\n\"x.example/base\" = \"v1.0.0\"\n\n[install]\ntimeout_secs = 5\n",
        )
        .unwrap();
        run(&layout, "github.com/org/ctx-a").unwrap();

        let after = std::fs::read_to_string(layout.manifest_path()).unwrap();
        for line in ["[install]", "timeout_secs = 5", "\"x.example/base\" = \"v1.0.0\""] {
            assert!(after.lines().any(|a| a == line), "lost line: {line}");
        }
        let manifest = ContextManifest::parse(&after).unwrap();
        assert_eq!(manifest.sources, vec!["github.com/org/ctx-a"]);
    }

    #[test]
    fn add_is_idempotent() {
        let (_dir, layout) = project();
        assert!(run(&layout, "github.com/org/ctx-a").unwrap());
        assert!(!run(&layout, "github.com/org/ctx-a").unwrap());
        let manifest = ContextManifest::load(&layout.manifest_path()).unwrap();
        assert_eq!(manifest.sources.len(), 1);
    }

    #[test]
    fn add_rejects_malformed_source() {
        let (_dir, layout) = project();
        assert!(run(&layout, "github.com/org/x@bad token").is_err());
        assert!(run(&layout, "").is_err());
    }
}
