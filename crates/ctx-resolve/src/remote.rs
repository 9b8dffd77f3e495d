//! Checkout capability consumed by the resolver, and an in-memory implementation.
//!
//! The `Remote` trait is the narrow seam between resolution and any real
//! version-control client: tag listing, branch-head lookup, materializing a
//! checkout, and reading the head commit of a checkout. `MemoryRemote`
//! serves repositories from memory for development and testing.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::declaration::{Declaration, CONTEXT_TOML};
use crate::error::{ResolveError, Result};
use crate::source::SourceIdentity;
use crate::token::{tag_version, Version};

/// Tag name → commit hash for one remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    tags: BTreeMap<String, String>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `git ls-remote --tags` output.
    ///
    /// Annotated tags appear twice: once as the tag object (`refs/tags/v1`)
    /// and once dereferenced (`refs/tags/v1^{}`). The dereferenced commit
    /// wins regardless of line order.
    pub fn from_ls_remote(output: &str) -> Self {
        let mut direct = BTreeMap::new();
        let mut peeled = BTreeMap::new();
        for line in output.lines() {
            let mut parts = line.split_whitespace();
            let (Some(sha), Some(reference)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Some(tag) = reference.strip_prefix("refs/tags/") else {
                continue;
            };
            match tag.strip_suffix("^{}") {
                Some(name) => peeled.insert(name.to_string(), sha.to_string()),
                None => direct.insert(tag.to_string(), sha.to_string()),
            };
        }
        direct.extend(peeled);
        TagIndex { tags: direct }
    }

    /// Record a tag. Later inserts for the same name replace earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, commit: impl Into<String>) {
        self.tags.insert(name.into(), commit.into());
    }

    pub fn commit(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(t, c)| (t.as_str(), c.as_str()))
    }

    /// Semantic versions named by tags, each mapped to the tag that names it.
    ///
    /// When both `v1.2.0` and `1.2.0` exist, the `v`-prefixed tag is used.
    pub fn versions(&self) -> BTreeMap<Version, &str> {
        let mut out: BTreeMap<Version, &str> = BTreeMap::new();
        for name in self.tags.keys() {
            let name = name.as_str();
            let Some(version) = tag_version(name) else {
                continue;
            };
            let prefer = name.starts_with('v');
            out.entry(version)
                .and_modify(|existing| {
                    if prefer {
                        *existing = name;
                    }
                })
                .or_insert(name);
        }
        out
    }
}

/// Abstract checkout capability.
///
/// Implementations answer version queries against a source's remote and
/// materialize checkouts on local disk.
pub trait Remote {
    /// List every tag on the remote with the commit it points at.
    fn list_tags(&self, identity: &SourceIdentity) -> Result<TagIndex>;

    /// Look up the head commit of a branch; `None` if the branch does not exist.
    fn resolve_branch_head(
        &self,
        identity: &SourceIdentity,
        branch: &str,
    ) -> Result<Option<String>>;

    /// Name of the remote's default branch.
    fn default_branch(&self, _identity: &SourceIdentity) -> Result<String> {
        Ok("main".to_string())
    }

    /// Check out `reference` (tag, branch, or commit) and return the local path.
    ///
    /// Re-materializing an identity at the ref it already has is a no-op.
    fn materialize(&self, identity: &SourceIdentity, reference: &str) -> Result<PathBuf>;

    /// The commit currently checked out at `path`.
    fn head_commit(&self, path: &Path) -> Result<String>;
}

/// One commit of an in-memory repository.
#[derive(Debug, Clone, Default)]
struct MemoryCommit {
    depends: Vec<String>,
}

/// An in-memory repository: tags, branches, and per-commit declarations.
#[derive(Debug, Clone)]
pub struct MemoryRepo {
    tags: TagIndex,
    branches: BTreeMap<String, String>,
    default_branch: String,
    commits: BTreeMap<String, MemoryCommit>,
}

impl Default for MemoryRepo {
    fn default() -> Self {
        MemoryRepo {
            tags: TagIndex::new(),
            branches: BTreeMap::new(),
            default_branch: "main".to_string(),
            commits: BTreeMap::new(),
        }
    }
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit declaring `depends`.
    pub fn commit(mut self, hash: &str, depends: &[&str]) -> Self {
        self.commits.insert(
            hash.to_string(),
            MemoryCommit {
                depends: depends.iter().map(|d| d.to_string()).collect(),
            },
        );
        self
    }

    /// Add a tag pointing at a commit (the commit is created if missing).
    pub fn tag(mut self, name: &str, hash: &str) -> Self {
        self.commits.entry(hash.to_string()).or_default();
        self.tags.insert(name, hash);
        self
    }

    /// Add a branch pointing at a commit (the commit is created if missing).
    pub fn branch(mut self, name: &str, hash: &str) -> Self {
        self.commits.entry(hash.to_string()).or_default();
        self.branches.insert(name.to_string(), hash.to_string());
        self
    }

    pub fn default_branch(mut self, name: &str) -> Self {
        self.default_branch = name.to_string();
        self
    }

    fn resolve(&self, reference: &str) -> Option<&str> {
        if let Some(commit) = self.tags.commit(reference) {
            return Some(commit);
        }
        if let Some(commit) = self.branches.get(reference) {
            return Some(commit);
        }
        self.commits
            .keys()
            .find(|hash| hash.starts_with(reference))
            .map(String::as_str)
    }
}

/// A `Remote` serving repositories from memory.
///
/// Checkouts are written under `root` as a directory per identity holding a
/// `context.toml` with that commit's declared dependencies.
pub struct MemoryRemote {
    root: PathBuf,
    repos: RefCell<BTreeMap<SourceIdentity, MemoryRepo>>,
    heads: RefCell<BTreeMap<PathBuf, String>>,
    gateway_calls: Cell<usize>,
    materializations: Cell<usize>,
}

impl MemoryRemote {
    /// Create a remote whose checkouts land under `root`.
    pub fn new(root: PathBuf) -> Self {
        MemoryRemote {
            root,
            repos: RefCell::new(BTreeMap::new()),
            heads: RefCell::new(BTreeMap::new()),
            gateway_calls: Cell::new(0),
            materializations: Cell::new(0),
        }
    }

    /// Register (or replace) the repository behind `identity`.
    pub fn insert(&self, identity: &str, repo: MemoryRepo) -> Result<()> {
        let identity = SourceIdentity::new(identity)?;
        self.repos.borrow_mut().insert(identity, repo);
        Ok(())
    }

    /// Move a tag to another commit, as a force-pushed tag would.
    pub fn retag(&self, identity: &str, tag: &str, hash: &str) -> Result<()> {
        let identity = SourceIdentity::new(identity)?;
        let mut repos = self.repos.borrow_mut();
        let repo = repos.get_mut(&identity).ok_or_else(|| ResolveError::Remote {
            identity: identity.to_string(),
            detail: "repository not found".to_string(),
        })?;
        repo.commits.entry(hash.to_string()).or_default();
        repo.tags.insert(tag, hash);
        Ok(())
    }

    /// Number of tag-listing and branch-head queries served so far.
    pub fn gateway_calls(&self) -> usize {
        self.gateway_calls.get()
    }

    /// Number of checkouts performed so far.
    pub fn materializations(&self) -> usize {
        self.materializations.get()
    }

    fn with_repo<T>(
        &self,
        identity: &SourceIdentity,
        f: impl FnOnce(&MemoryRepo) -> Result<T>,
    ) -> Result<T> {
        let repos = self.repos.borrow();
        let repo = repos.get(identity).ok_or_else(|| ResolveError::Remote {
            identity: identity.to_string(),
            detail: "repository not found".to_string(),
        })?;
        f(repo)
    }

    fn checkout_dir(&self, identity: &SourceIdentity) -> PathBuf {
        let sanitized: String = identity
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.root.join(sanitized)
    }
}

impl Remote for MemoryRemote {
    fn list_tags(&self, identity: &SourceIdentity) -> Result<TagIndex> {
        self.gateway_calls.set(self.gateway_calls.get() + 1);
        self.with_repo(identity, |repo| Ok(repo.tags.clone()))
    }

    fn resolve_branch_head(
        &self,
        identity: &SourceIdentity,
        branch: &str,
    ) -> Result<Option<String>> {
        self.gateway_calls.set(self.gateway_calls.get() + 1);
        self.with_repo(identity, |repo| Ok(repo.branches.get(branch).cloned()))
    }

    fn default_branch(&self, identity: &SourceIdentity) -> Result<String> {
        self.with_repo(identity, |repo| Ok(repo.default_branch.clone()))
    }

    fn materialize(&self, identity: &SourceIdentity, reference: &str) -> Result<PathBuf> {
        let (commit, depends) = self.with_repo(identity, |repo| {
            let commit = repo.resolve(reference).ok_or_else(|| ResolveError::Remote {
                identity: identity.to_string(),
                detail: format!("cannot check out '{reference}'"),
            })?;
            let depends = repo.commits.get(commit).map(|c| c.depends.clone()).unwrap_or_default();
            Ok((commit.to_string(), depends))
        })?;

        let dir = self.checkout_dir(identity);
        if self.heads.borrow().get(&dir) == Some(&commit) {
            return Ok(dir);
        }

        std::fs::create_dir_all(&dir)?;
        let declaration = Declaration {
            name: None,
            version: None,
            depends,
        };
        std::fs::write(dir.join(CONTEXT_TOML), declaration.to_toml()?)?;
        self.heads.borrow_mut().insert(dir.clone(), commit);
        self.materializations.set(self.materializations.get() + 1);
        Ok(dir)
    }

    fn head_commit(&self, path: &Path) -> Result<String> {
        self.heads
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| ResolveError::Remote {
                identity: path.display().to_string(),
                detail: "no checkout at this path".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LS_REMOTE: &str = "\
1111111111111111111111111111111111111111\trefs/tags/v1.0.0
2222222222222222222222222222222222222222\trefs/tags/v1.1.0
3333333333333333333333333333333333333333\trefs/tags/v1.1.0^{}
4444444444444444444444444444444444444444\trefs/tags/nightly
5555555555555555555555555555555555555555\trefs/heads/main
";

    #[test]
    fn parse_ls_remote_prefers_peeled_commit() {
        let index = TagIndex::from_ls_remote(LS_REMOTE);
        assert_eq!(index.len(), 3);
        assert_eq!(index.commit("v1.0.0"), Some("1111111111111111111111111111111111111111"));
        assert_eq!(index.commit("v1.1.0"), Some("3333333333333333333333333333333333333333"));
        assert_eq!(index.commit("nightly"), Some("4444444444444444444444444444444444444444"));
    }

    #[test]
    fn peeled_wins_even_when_listed_first() {
        let out = "bbbb\trefs/tags/v2.0.0^{}\naaaa\trefs/tags/v2.0.0\n";
        let index = TagIndex::from_ls_remote(out);
        assert_eq!(index.commit("v2.0.0"), Some("bbbb"));
    }

    #[test]
    fn versions_ignore_non_semver_tags() {
        let index = TagIndex::from_ls_remote(LS_REMOTE);
        let versions = index.versions();
        assert_eq!(versions.len(), 2);
        assert!(versions.keys().all(|v| v.major == 1));
    }

    #[test]
    fn versions_prefer_v_prefixed_tag() {
        let mut index = TagIndex::new();
        index.insert("1.2.0", "aaaa");
        index.insert("v1.2.0", "bbbb");
        let versions = index.versions();
        assert_eq!(versions.values().copied().collect::<Vec<_>>(), vec!["v1.2.0"]);
    }

    #[test]
    fn memory_remote_materializes_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new(dir.path().to_path_buf());
        remote
            .insert(
                "example.com/a",
                MemoryRepo::new()
                    .commit("aaaaaaa1", &["example.com/b@^1.0.0"])
                    .tag("v1.0.0", "aaaaaaa1"),
            )
            .unwrap();

        let id = SourceIdentity::new("example.com/a").unwrap();
        let path = remote.materialize(&id, "v1.0.0").unwrap();
        assert_eq!(remote.head_commit(&path).unwrap(), "aaaaaaa1");
        let content = std::fs::read_to_string(path.join(CONTEXT_TOML)).unwrap();
        assert!(content.contains("example.com/b@^1.0.0"));

        // Same ref again is a no-op.
        remote.materialize(&id, "v1.0.0").unwrap();
        assert_eq!(remote.materializations(), 1);
        assert_eq!(remote.gateway_calls(), 0);
    }

    #[test]
    fn memory_remote_unknown_ref_fails() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new(dir.path().to_path_buf());
        remote
            .insert("example.com/a", MemoryRepo::new().tag("v1.0.0", "aaaaaaa1"))
            .unwrap();
        let id = SourceIdentity::new("example.com/a").unwrap();
        assert!(remote.materialize(&id, "v9.9.9").is_err());
    }
}
