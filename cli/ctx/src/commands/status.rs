//! `ctx status` — show what the lock file pins.

use anyhow::Result;
use ctx_resolve::{format_lock, LockFile, ProjectLayout};

use crate::manifest::ContextManifest;

pub fn run(layout: &ProjectLayout, manifest: &ContextManifest) -> Result<()> {
    print!("{}", render(layout, manifest)?);
    Ok(())
}

pub(crate) fn render(layout: &ProjectLayout, manifest: &ContextManifest) -> Result<String> {
    let Some(lock) = LockFile::load(&layout.lock_path())? else {
        return Ok("No lock file (run `ctx install`)\n".to_string());
    };

    let mut out = format_lock(&lock);
    let roots = manifest.top_level_identities()?;
    let stale = lock.stale_entries(&roots);
    if !stale.is_empty() {
        out.push_str("\nNo longer reachable from the manifest (kept in lock):\n");
        for entry in stale {
            out.push_str(&format!("  {} @ {}\n", entry.identity, entry.short_commit()));
        }
    }
    out.push_str(&format!("\n{} locked source(s)\n", lock.len()));
    Ok(out)
}
