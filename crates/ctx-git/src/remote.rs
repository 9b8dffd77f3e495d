//! `Remote` implementation backed by the `git` executable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ctx_resolve::remote::{Remote, TagIndex};
use ctx_resolve::token::looks_like_commit;
use ctx_resolve::SourceIdentity;
use tracing::{debug, info};

use crate::command::Git;
use crate::error::GitError;
use crate::url::{install_path, repo_url};

/// How new checkouts are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Register each source as a submodule of the project repository.
    Submodule,
    /// Plain clone into the packages directory.
    Clone,
}

/// Checkout capability that talks to real remotes through `git`.
#[derive(Debug, Clone)]
pub struct GitRemote {
    project_root: PathBuf,
    packages_dir: PathBuf,
    mode: CheckoutMode,
    git: Git,
}

impl GitRemote {
    /// Checkouts go under `packages_dir`. Submodules are used when
    /// `project_root` is inside a git work tree.
    pub fn new(project_root: &Path, packages_dir: &Path, timeout: Duration) -> Self {
        let git = Git::new(project_root, timeout);
        let inside_work_tree = git
            .try_run(&["rev-parse", "--is-inside-work-tree"])
            .ok()
            .flatten()
            .is_some_and(|out| out.trim() == "true");
        let mode = if inside_work_tree {
            CheckoutMode::Submodule
        } else {
            CheckoutMode::Clone
        };
        Self::with_mode(project_root, packages_dir, timeout, mode)
    }

    pub fn with_mode(
        project_root: &Path,
        packages_dir: &Path,
        timeout: Duration,
        mode: CheckoutMode,
    ) -> Self {
        GitRemote {
            project_root: project_root.to_path_buf(),
            packages_dir: packages_dir.to_path_buf(),
            mode,
            git: Git::new(project_root, timeout),
        }
    }

    pub fn mode(&self) -> CheckoutMode {
        self.mode
    }

    /// Where `identity` is checked out.
    pub fn checkout_path(&self, identity: &SourceIdentity) -> PathBuf {
        self.packages_dir.join(install_path(identity.as_str()))
    }

    fn ensure_checkout(&self, identity: &SourceIdentity, dir: &Path) -> Result<(), GitError> {
        if dir.join(".git").exists() {
            return Ok(());
        }
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = repo_url(identity.as_str());
        let target = dir.to_string_lossy();
        match self.mode {
            CheckoutMode::Submodule => {
                info!(%identity, "adding submodule");
                let rel = dir
                    .strip_prefix(&self.project_root)
                    .unwrap_or(dir)
                    .to_string_lossy()
                    .into_owned();
                self.git.run(&["submodule", "add", "--force", "--", &url, &rel])?;
                self.git.run(&["submodule", "update", "--init", "--", &rel])?;
            }
            CheckoutMode::Clone => {
                info!(%identity, "cloning");
                self.git.run(&["clone", "--quiet", "--", &url, &target])?;
            }
        }
        Ok(())
    }

    /// Map `reference` to a commit inside a checkout: tag, then remote
    /// branch, then anything git can resolve (commit prefixes).
    fn local_commit(&self, dir: &Path, reference: &str) -> Result<String, GitError> {
        let git = self.git.at(dir);
        let candidates = [
            format!("refs/tags/{reference}^{{commit}}"),
            format!("refs/remotes/origin/{reference}^{{commit}}"),
            format!("{reference}^{{commit}}"),
        ];
        for candidate in &candidates {
            if let Some(out) = git.try_run(&["rev-parse", "--verify", "--quiet", candidate])? {
                return Ok(out.trim().to_string());
            }
        }
        Err(GitError::UnknownRef {
            reference: reference.to_string(),
            path: dir.display().to_string(),
        })
    }
}

impl Remote for GitRemote {
    fn list_tags(&self, identity: &SourceIdentity) -> ctx_resolve::Result<TagIndex> {
        let url = repo_url(identity.as_str());
        let out = self
            .git
            .run(&["ls-remote", "--tags", &url])
            .map_err(|e| e.for_identity(identity))?;
        let index = TagIndex::from_ls_remote(&out);
        debug!(%identity, tags = index.len(), "listed tags");
        Ok(index)
    }

    fn resolve_branch_head(
        &self,
        identity: &SourceIdentity,
        branch: &str,
    ) -> ctx_resolve::Result<Option<String>> {
        let url = repo_url(identity.as_str());
        let out = self
            .git
            .run(&["ls-remote", "--heads", &url, branch])
            .map_err(|e| e.for_identity(identity))?;
        let wanted = format!("refs/heads/{branch}");
        Ok(out.lines().find_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(sha), Some(name)) if name == wanted => Some(sha.to_string()),
                _ => None,
            }
        }))
    }

    fn default_branch(&self, identity: &SourceIdentity) -> ctx_resolve::Result<String> {
        let url = repo_url(identity.as_str());
        let out = self
            .git
            .run(&["ls-remote", "--symref", &url, "HEAD"])
            .map_err(|e| e.for_identity(identity))?;
        let branch = out
            .lines()
            .filter_map(|line| line.strip_prefix("ref:"))
            .filter_map(|rest| rest.split_whitespace().next())
            .find_map(|r| r.strip_prefix("refs/heads/"))
            .unwrap_or("main");
        Ok(branch.to_string())
    }

    fn materialize(
        &self,
        identity: &SourceIdentity,
        reference: &str,
    ) -> ctx_resolve::Result<PathBuf> {
        let dir = self.checkout_path(identity);
        self.ensure_checkout(identity, &dir)
            .map_err(|e| e.for_identity(identity))?;

        let git = self.git.at(&dir);
        if looks_like_commit(reference) {
            let head = git
                .run(&["rev-parse", "HEAD"])
                .map_err(|e| e.for_identity(identity))?;
            if head.trim().starts_with(reference) {
                debug!(%identity, reference, "already checked out");
                return Ok(dir);
            }
        }

        git.run(&["fetch", "--all", "--tags", "--prune", "--quiet"])
            .map_err(|e| e.for_identity(identity))?;
        let commit = self
            .local_commit(&dir, reference)
            .map_err(|e| e.for_identity(identity))?;
        git.run(&["checkout", "--quiet", "--detach", &commit])
            .map_err(|e| e.for_identity(identity))?;
        debug!(%identity, reference, %commit, "checked out");
        Ok(dir)
    }

    fn head_commit(&self, path: &Path) -> ctx_resolve::Result<String> {
        let out = self
            .git
            .at(path)
            .run(&["rev-parse", "HEAD"])
            .map_err(|e| e.for_identity(path.display()))?;
        Ok(out.trim().to_string())
    }
}
