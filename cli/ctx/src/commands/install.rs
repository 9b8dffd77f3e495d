//! `ctx install` — resolve (or replay) every source and update the lock file.

use anyhow::{Context, Result};
use ctx_coord::{holder_id, ScopeLock};
use ctx_git::GitRemote;
use ctx_resolve::{InstallOptions, InstallReport, ProjectLayout, Remote};
use tracing::debug;

use crate::manifest::ContextManifest;

/// Scope lock taken for the duration of an install.
const INSTALL_SCOPE: &str = "install";

/// Run `ctx install [--frozen] [--strict]`.
pub fn run(
    layout: &ProjectLayout,
    manifest: &ContextManifest,
    frozen: bool,
    strict: bool,
) -> Result<()> {
    let remote = GitRemote::new(layout.root(), &layout.packages_dir(), manifest.install.timeout());
    if frozen {
        println!("Frozen install: using .context/lock.toml");
    }
    let report = install_with(layout, manifest, &remote, InstallOptions { frozen, strict })?;
    print!("{}", render(&report));
    Ok(())
}

/// Install under the `install` scope lock, releasing it on every path.
pub(crate) fn install_with(
    layout: &ProjectLayout,
    manifest: &ContextManifest,
    remote: &dyn Remote,
    options: InstallOptions,
) -> Result<InstallReport> {
    let request = manifest.request()?;
    let scope = ScopeLock::new(layout.locks_dir(), manifest.install.lock_ttl());
    let holder = holder_id();
    let guard = scope
        .acquire(INSTALL_SCOPE, &holder)
        .context("another install is running in this project")?;
    debug!(%holder, frozen = options.frozen, "holding install lock");

    let report = ctx_resolve::install(layout, remote, &request, options)?;
    guard.release().context("releasing install lock")?;
    Ok(report)
}

pub(crate) fn render(report: &InstallReport) -> String {
    let mut out = String::new();
    for source in &report.installed {
        let version = source
            .version
            .as_ref()
            .map(|v| format!("@{v}"))
            .unwrap_or_default();
        out.push_str(&format!(
            "✓ Installed {}{version} @ {}\n",
            source.identity,
            source.short_commit()
        ));
    }
    for late in &report.late_tokens {
        out.push_str(&format!(
            "⚠ {}: '{}' was declared after resolving to {}\n",
            late.identity, late.token, late.resolved
        ));
    }
    if report.lock_updated {
        out.push_str("✓ Updated .context/lock.toml\n");
    }
    out
}
