//! Install orchestration: live resolution or frozen replay, then persist.
//!
//! A live install writes the lock file once, after the whole walk has
//! succeeded. A frozen install never writes it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::info;

use crate::error::{ResolveError, Result};
use crate::layout::ProjectLayout;
use crate::lock::LockFile;
use crate::remote::Remote;
use crate::replay;
use crate::source::{SourceIdentity, SourceSpec};
use crate::token::{RequirementToken, Version};
use crate::walk::{self, LateToken, WalkOptions};

/// What the manifest asks for.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub sources: Vec<SourceSpec>,
    pub overrides: BTreeMap<SourceIdentity, RequirementToken>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Replay the existing lock file instead of resolving.
    pub frozen: bool,
    /// Treat unsatisfied late-arriving requirements as conflicts.
    pub strict: bool,
}

/// One source checked out by an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSource {
    pub identity: SourceIdentity,
    pub version: Option<Version>,
    pub commit: String,
    pub path: PathBuf,
}

impl InstalledSource {
    pub fn short_commit(&self) -> &str {
        self.commit.get(..7).unwrap_or(&self.commit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledSource>,
    pub late_tokens: Vec<LateToken>,
    /// Whether the lock file was rewritten.
    pub lock_updated: bool,
}

/// Install every source the request reaches into `layout`.
///
/// Callers that share the project directory across processes are expected
/// to hold the `install` scope lock for the duration of this call.
pub fn install(
    layout: &ProjectLayout,
    remote: &dyn Remote,
    request: &InstallRequest,
    options: InstallOptions,
) -> Result<InstallReport> {
    let lock_path = layout.lock_path();
    let existing = LockFile::load(&lock_path)?;

    if options.frozen {
        let lock = existing.ok_or_else(|| ResolveError::Precondition {
            detail: format!(
                "frozen install requires {}; run a live install first",
                lock_path.display()
            ),
        })?;
        info!(entries = lock.len(), "replaying lock file");
        let installed = replay::replay(remote, &lock)?
            .into_iter()
            .map(|r| InstalledSource {
                identity: r.entry.identity,
                version: r.entry.version,
                commit: r.entry.commit,
                path: r.path,
            })
            .collect();
        return Ok(InstallReport {
            installed,
            late_tokens: Vec::new(),
            lock_updated: false,
        });
    }

    let mut lock = existing.unwrap_or_default();
    let walk_options = WalkOptions {
        strict_late_tokens: options.strict,
    };
    let outcome = walk::walk(
        remote,
        &request.sources,
        &request.overrides,
        walk_options,
        &mut lock,
    )?;
    lock.save(&lock_path)?;
    info!(path = %lock_path.display(), entries = lock.len(), "lock file written");

    let installed = outcome
        .resolved
        .into_iter()
        .map(|r| InstalledSource {
            identity: r.resolution.identity,
            version: r.resolution.version,
            commit: r.resolution.commit,
            path: r.path,
        })
        .collect();
    Ok(InstallReport {
        installed,
        late_tokens: outcome.late_tokens,
        lock_updated: true,
    })
}
