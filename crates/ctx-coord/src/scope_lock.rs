//! TTL-bounded mutual exclusion over named scopes.
//!
//! Each scope is a JSON record `<dir>/<scope>.json` naming its holder and
//! lease expiry. Reads and writes of the record happen under an exclusive
//! OS file lock on `<dir>/<scope>.lock`, so concurrent acquirers see a
//! consistent record.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoordError, Result};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Who holds a scope, and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub scope: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Scope locks stored under one directory.
#[derive(Clone)]
pub struct ScopeLock {
    dir: PathBuf,
    ttl: Duration,
    clock: Clock,
}

impl std::fmt::Debug for ScopeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeLock")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ScopeLock {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        ScopeLock {
            dir: dir.into(),
            ttl,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the system clock, for tests.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take `scope` for `holder`.
    ///
    /// Any live lease fails with [`CoordError::LockConflict`], including one
    /// held by the same holder; use [`ScopeGuard::renew`] to extend a lease.
    /// An expired lease is taken over.
    pub fn acquire(&self, scope: &str, holder: &str) -> Result<ScopeGuard> {
        self.with_record(scope, |record_path| {
            let now = (self.clock)();
            if let Some(current) = read_record(record_path)? {
                if !current.is_expired(now) {
                    return Err(CoordError::LockConflict {
                        scope: scope.to_string(),
                        holder: current.holder,
                        expires_at: current.expires_at,
                    });
                }
                warn!(
                    scope,
                    previous = %current.holder,
                    expired_at = %current.expires_at,
                    "reclaiming expired scope lock"
                );
            }
            let record = self.write_lease(record_path, scope, holder, now)?;
            debug!(scope, holder, expires_at = %record.expires_at, "acquired scope lock");
            Ok(())
        })?;

        Ok(ScopeGuard {
            lock: self.clone(),
            scope: scope.to_string(),
            holder: holder.to_string(),
            released: false,
        })
    }

    /// Extend `holder`'s lease on `scope` by a full TTL from now.
    ///
    /// Fails with [`CoordError::LockConflict`] if someone else has taken the
    /// scope in the meantime.
    pub fn renew(&self, scope: &str, holder: &str) -> Result<LockRecord> {
        self.with_record(scope, |record_path| {
            let now = (self.clock)();
            if let Some(current) = read_record(record_path)? {
                if current.holder != holder {
                    return Err(CoordError::LockConflict {
                        scope: scope.to_string(),
                        holder: current.holder,
                        expires_at: current.expires_at,
                    });
                }
            }
            let record = self.write_lease(record_path, scope, holder, now)?;
            debug!(scope, holder, expires_at = %record.expires_at, "renewed scope lock");
            Ok(record)
        })
    }

    /// Give up `scope` if `holder` owns it. Returns whether anything was released.
    pub fn release(&self, scope: &str, holder: &str) -> Result<bool> {
        self.with_record(scope, |record_path| match read_record(record_path)? {
            Some(current) if current.holder == holder => {
                fs::remove_file(record_path)?;
                debug!(scope, holder, "released scope lock");
                Ok(true)
            }
            Some(current) => {
                debug!(
                    scope,
                    holder,
                    owner = %current.holder,
                    "not releasing scope held by another holder"
                );
                Ok(false)
            }
            None => Ok(false),
        })
    }

    /// The current record for `scope`, expired or not.
    pub fn current(&self, scope: &str) -> Result<Option<LockRecord>> {
        self.with_record(scope, read_record)
    }

    fn write_lease(
        &self,
        record_path: &Path,
        scope: &str,
        holder: &str,
        now: DateTime<Utc>,
    ) -> Result<LockRecord> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let record = LockRecord {
            scope: scope.to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        write_record(record_path, &record)?;
        Ok(record)
    }

    fn with_record<T>(&self, scope: &str, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        validate_scope(scope)?;
        fs::create_dir_all(&self.dir)?;
        let mutex = mutex_file(&self.dir.join(format!("{scope}.lock")))?;
        mutex.lock_exclusive()?;
        let result = f(&self.dir.join(format!("{scope}.json")));
        let _ = mutex.unlock();
        result
    }
}

/// Holds a scope until dropped or explicitly released.
#[derive(Debug)]
pub struct ScopeGuard {
    lock: ScopeLock,
    scope: String,
    holder: String,
    released: bool,
}

impl ScopeGuard {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Extend the lease held by this guard.
    pub fn renew(&self) -> Result<LockRecord> {
        self.lock.renew(&self.scope, &self.holder)
    }

    /// Release now, surfacing any error instead of logging it on drop.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release(&self.scope, &self.holder).map(|_| ())
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.lock.release(&self.scope, &self.holder) {
            warn!(scope = %self.scope, error = %e, "failed to release scope lock");
        }
    }
}

/// Identity of this process for lock records: `<node>:<pid>`, where the
/// node is `CTX_NODE_NAME`, else `HOSTNAME`, else `local`.
pub fn holder_id() -> String {
    format!("{}:{}", node_name(), std::process::id())
}

fn node_name() -> String {
    ["CTX_NODE_NAME", "HOSTNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

fn validate_scope(scope: &str) -> Result<()> {
    let ok = !scope.is_empty()
        && scope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CoordError::InvalidScope(scope.to_string()))
    }
}

fn mutex_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?)
}

fn read_record(path: &Path) -> Result<Option<LockRecord>> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable lock record");
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_record(path: &Path, record: &LockRecord) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn fixed_clock() -> (Arc<AtomicI64>, impl Fn() -> DateTime<Utc> + Send + Sync + 'static) {
        let secs = Arc::new(AtomicI64::new(1_767_225_600));
        let handle = secs.clone();
        let clock = move || {
            Utc.timestamp_opt(handle.load(Ordering::SeqCst), 0)
                .single()
                .unwrap()
        };
        (secs, clock)
    }

    #[test]
    fn second_holder_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        let _guard = lock.acquire("install", "node-a").unwrap();

        let err = lock.acquire("install", "node-b").unwrap_err();
        match err {
            CoordError::LockConflict { scope, holder, .. } => {
                assert_eq!(scope, "install");
                assert_eq!(holder, "node-a");
            }
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        {
            let guard = lock.acquire("install", "node-a").unwrap();
            assert_eq!(guard.scope(), "install");
            assert!(lock.current("install").unwrap().is_some());
        }
        assert!(lock.current("install").unwrap().is_none());
        lock.acquire("install", "node-b").unwrap().release().unwrap();
    }

    #[test]
    fn guard_renews_its_lease() {
        let dir = tempfile::tempdir().unwrap();
        let (secs, clock) = fixed_clock();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(60)).with_clock(clock);
        let guard = lock.acquire("install", "node-a").unwrap();
        let before = lock.current("install").unwrap().unwrap().expires_at;

        secs.fetch_add(30, Ordering::SeqCst);
        let renewed = guard.renew().unwrap();
        assert_eq!(renewed.expires_at - before, chrono::Duration::seconds(30));
        assert_eq!(lock.current("install").unwrap().unwrap(), renewed);
        guard.release().unwrap();
    }

    #[test]
    fn same_holder_cannot_acquire_twice() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        let holder = holder_id();
        let first = lock.acquire("install", &holder).unwrap();
        assert!(matches!(
            lock.acquire("install", &holder),
            Err(CoordError::LockConflict { .. })
        ));
        drop(first);
        lock.acquire("install", &holder).unwrap();
    }

    #[test]
    fn holders_differ_per_process() {
        let holder = holder_id();
        let pid = std::process::id().to_string();
        let (node, suffix) = holder.rsplit_once(':').unwrap();
        assert_eq!(suffix, pid);
        assert!(!node.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        let _guard = lock.acquire("install", &holder).unwrap();
        let other_process = format!("{node}:{}", std::process::id().wrapping_add(1));
        match lock.acquire("install", &other_process) {
            Err(CoordError::LockConflict { holder: owner, .. }) => assert_eq!(owner, holder),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn renew_after_takeover_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (secs, clock) = fixed_clock();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(60)).with_clock(clock);
        let stale = lock.acquire("install", "node-a").unwrap();
        secs.fetch_add(61, Ordering::SeqCst);
        let _fresh = lock.acquire("install", "node-b").unwrap();
        assert!(matches!(stale.renew(), Err(CoordError::LockConflict { .. })));
        std::mem::forget(stale);
    }

    #[test]
    fn expired_lease_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let (secs, clock) = fixed_clock();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(60)).with_clock(clock);
        let stale = lock.acquire("install", "crashed").unwrap();
        std::mem::forget(stale);

        secs.fetch_add(61, Ordering::SeqCst);
        let guard = lock.acquire("install", "node-b").unwrap();
        assert_eq!(lock.current("install").unwrap().unwrap().holder, "node-b");
        drop(guard);
    }

    #[test]
    fn release_by_non_holder_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        let _guard = lock.acquire("install", "node-a").unwrap();
        assert!(!lock.release("install", "node-b").unwrap());
        assert_eq!(lock.current("install").unwrap().unwrap().holder, "node-a");
        assert!(!lock.release("other", "node-a").unwrap());
    }

    #[test]
    fn scopes_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        let _a = lock.acquire("install", "node-a").unwrap();
        let _b = lock.acquire("push", "node-b").unwrap();
    }

    #[test]
    fn reject_path_like_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        assert!(matches!(
            lock.acquire("../escape", "node-a"),
            Err(CoordError::InvalidScope(_))
        ));
        assert!(lock.acquire("", "node-a").is_err());
    }

    #[test]
    fn corrupt_record_is_treated_as_free() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("install.json"), "not json").unwrap();
        let lock = ScopeLock::new(dir.path(), Duration::from_secs(600));
        lock.acquire("install", "node-a").unwrap();
    }
}
