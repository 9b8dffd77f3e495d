//! Frozen replay: check out exactly what the lock file records.
//!
//! Replay never lists tags or looks up branches. It only checks out locked
//! commits, so moved tags or advanced branches upstream cannot change the
//! result.

use std::path::PathBuf;

use tracing::info;

use crate::error::{ResolveError, Result};
use crate::lock::{LockEntry, LockFile};
use crate::remote::Remote;

/// One replayed lock entry and where it was checked out.
#[derive(Debug, Clone)]
pub struct ReplayedSource {
    pub entry: LockEntry,
    pub path: PathBuf,
}

/// Materialize every locked entry at its recorded commit, in lock order.
pub fn replay(remote: &dyn Remote, lock: &LockFile) -> Result<Vec<ReplayedSource>> {
    let mut replayed = Vec::with_capacity(lock.len());
    for entry in lock.entries() {
        let path = remote.materialize(&entry.identity, &entry.commit)?;
        let head = remote.head_commit(&path)?;
        if !head.starts_with(&entry.commit) {
            return Err(ResolveError::Remote {
                identity: entry.identity.to_string(),
                detail: format!("checkout is at {head}, lock expects {}", entry.commit),
            });
        }
        info!(identity = %entry.identity, commit = %entry.commit, "replayed locked source");
        replayed.push(ReplayedSource {
            entry: entry.clone(),
            path,
        });
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::remote::{MemoryRemote, MemoryRepo};
    use crate::source::{SourceIdentity, SourceSpec};
    use crate::walk::{walk, WalkOptions};

    const OLD: &str = "0101010101010101010101010101010101010101";
    const NEW: &str = "0202020202020202020202020202020202020202";
    const DEP: &str = "0303030303030303030303030303030303030303";

    #[test]
    fn replay_ignores_moved_tags() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new(dir.path().to_path_buf());
        remote
            .insert(
                "x.example/a",
                MemoryRepo::new()
                    .commit(OLD, &["x.example/dep@v1.0.0"])
                    .tag("v1.0.0", OLD),
            )
            .unwrap();
        remote
            .insert("x.example/dep", MemoryRepo::new().tag("v1.0.0", DEP))
            .unwrap();

        let mut lock = LockFile::new();
        let top = vec![SourceSpec::parse("x.example/a@^1").unwrap()];
        walk(&remote, &top, &BTreeMap::new(), WalkOptions::default(), &mut lock).unwrap();
        let calls_after_resolve = remote.gateway_calls();

        remote.retag("x.example/a", "v1.0.0", NEW).unwrap();
        remote.retag("x.example/a", "v1.1.0", NEW).unwrap();

        let replayed = replay(&remote, &lock).unwrap();
        assert_eq!(remote.gateway_calls(), calls_after_resolve);
        assert_eq!(replayed.len(), 2);
        let a = SourceIdentity::new("x.example/a").unwrap();
        let head = remote.head_commit(&replayed[0].path).unwrap();
        assert_eq!(head, OLD);
        assert_eq!(lock.get(&a).unwrap().commit, head);
    }

    #[test]
    fn replay_of_empty_lock_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new(dir.path().to_path_buf());
        assert!(replay(&remote, &LockFile::new()).unwrap().is_empty());
        assert_eq!(remote.materializations(), 0);
    }

    #[test]
    fn replay_of_unknown_commit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new(dir.path().to_path_buf());
        remote
            .insert("x.example/a", MemoryRepo::new().tag("v1.0.0", OLD))
            .unwrap();
        let lock = LockFile::parse(&format!(
            "version = 1\n\n[[resolved]]\nidentity = \"x.example/a\"\ncommit = \"{NEW}\"\nresolved_at = \"2026-03-01T00:00:00Z\"\n"
        ))
        .unwrap();
        let err = replay(&remote, &lock).unwrap_err();
        assert!(err.is_retryable());
    }
}
