//! Lock file persistence and reconciliation.
//!
//! The lock file records one entry per source identity. Entries are only
//! ever inserted or replaced, never removed; identities that drop out of the
//! manifest stay in the file and are reported as stale.
//!
//! ```toml
//! version = 1
//!
//! [[resolved]]
//! identity = "github.com/org/ctx-a"
//! requested = "^1.0.0"
//! version = "1.2.0"
//! commit = "3f2a..."
//! depends = ["github.com/org/ctx-b@^2"]
//! resolved_at = "2026-01-01T00:00:00Z"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::resolution::Resolution;
use crate::source::{SourceIdentity, SourceSpec};
use crate::token::Version;

/// Lock file format version written by this crate.
pub const LOCK_VERSION: u32 = 1;

/// A persisted resolution plus what the source declared at that commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub identity: SourceIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub commit: String,
    #[serde(default)]
    pub depends: Vec<String>,
    pub resolved_at: DateTime<Utc>,
}

impl LockEntry {
    pub fn from_resolution(
        resolution: &Resolution,
        depends: Vec<String>,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        LockEntry {
            identity: resolution.identity.clone(),
            requested: resolution.requested.clone(),
            version: resolution.version.clone(),
            commit: resolution.commit.clone(),
            depends,
            resolved_at,
        }
    }

    /// First seven characters of the commit hash.
    pub fn short_commit(&self) -> &str {
        self.commit.get(..7).unwrap_or(&self.commit)
    }

    /// Identities this entry depends on, in declaration order.
    pub fn dependency_identities(&self) -> Vec<SourceIdentity> {
        self.depends
            .iter()
            .filter_map(|d| SourceSpec::parse(d).ok())
            .map(|spec| spec.identity)
            .collect()
    }
}

/// Versioned, ordered collection of lock entries, unique by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,
    #[serde(default)]
    resolved: Vec<LockEntry>,
}

impl Default for LockFile {
    fn default() -> Self {
        LockFile {
            version: LOCK_VERSION,
            resolved: Vec::new(),
        }
    }
}

impl LockFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry with the same identity, or append a new one.
    pub fn upsert(&mut self, entry: LockEntry) {
        match self.resolved.iter_mut().find(|e| e.identity == entry.identity) {
            Some(existing) => {
                debug!(identity = %entry.identity, commit = %entry.commit, "replacing lock entry");
                *existing = entry;
            }
            None => {
                debug!(identity = %entry.identity, commit = %entry.commit, "adding lock entry");
                self.resolved.push(entry);
            }
        }
    }

    pub fn get(&self, identity: &SourceIdentity) -> Option<&LockEntry> {
        self.resolved.iter().find(|e| &e.identity == identity)
    }

    pub fn entries(&self) -> &[LockEntry] {
        &self.resolved
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Parse a lock file from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let lock: LockFile = toml::from_str(input)?;
        if lock.version != LOCK_VERSION {
            return Err(ResolveError::Parse {
                detail: format!(
                    "unsupported lock file version {} (expected {LOCK_VERSION})",
                    lock.version
                ),
            });
        }
        let mut seen = BTreeSet::new();
        for entry in &lock.resolved {
            if !seen.insert(&entry.identity) {
                return Err(ResolveError::Parse {
                    detail: format!("duplicate lock entry for '{}'", entry.identity),
                });
            }
        }
        Ok(lock)
    }

    /// Serialize this lock file to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a lock file, or `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map(Some)
    }

    /// Write the lock file atomically: a sibling temp file renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, self.to_toml()?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Identities reachable from `roots` by following recorded `depends`.
    pub fn reachable_from(&self, roots: &[SourceIdentity]) -> BTreeSet<SourceIdentity> {
        let by_id: BTreeMap<&SourceIdentity, &LockEntry> =
            self.resolved.iter().map(|e| (&e.identity, e)).collect();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<SourceIdentity> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(entry) = by_id.get(&id) {
                stack.extend(entry.dependency_identities());
            }
        }
        seen
    }

    /// Entries kept in the file but no longer reachable from `roots`.
    pub fn stale_entries(&self, roots: &[SourceIdentity]) -> Vec<&LockEntry> {
        let reachable = self.reachable_from(roots);
        self.resolved
            .iter()
            .filter(|e| !reachable.contains(&e.identity))
            .collect()
    }
}
