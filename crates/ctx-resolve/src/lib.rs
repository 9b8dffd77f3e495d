//! Constraint resolution and lock file reconciliation for context sources.
//!
//! A context source is a version-controlled repository named by an identity
//! such as `github.com/org/ctx-base`. Projects and sources request each other
//! with `identity[@token]` strings, where the token is a semver range, an
//! exact tag, a branch, a commit hash, or `latest`.
//!
//! # Architecture
//!
//! - **Parsing**: [`SourceSpec`] and [`RequirementToken`] classify each
//!   requirement once.
//! - **Resolution**: [`resolve`] merges every token for one identity into a
//!   single [`Resolution`], or fails with a conflict.
//! - **Walking**: [`walk()`] follows declared dependencies to a fixpoint with
//!   an explicit worklist.
//! - **Locking**: [`LockFile`] records each resolution; [`replay`] checks the
//!   recorded commits back out without resolving anything.
//!
//! Version-control access goes through the [`Remote`] trait, so everything
//! here runs against [`MemoryRemote`] in tests.

pub mod declaration;
pub mod error;
pub mod install;
pub mod layout;
pub mod lock;
pub mod remote;
pub mod replay;
pub mod resolution;
pub mod source;
pub mod token;
pub mod tree;
pub mod walk;

// Re-exports for convenience.
pub use declaration::Declaration;
pub use error::{ResolveError, Result};
pub use install::{install, InstallOptions, InstallReport, InstallRequest, InstalledSource};
pub use layout::ProjectLayout;
pub use lock::{LockEntry, LockFile};
pub use remote::{MemoryRemote, MemoryRepo, Remote, TagIndex};
pub use replay::replay;
pub use resolution::{resolve, Resolution};
pub use source::{SourceIdentity, SourceSpec};
pub use token::{RequirementToken, Version, VersionReq};
pub use tree::{format_lock, format_tree};
pub use walk::{walk, LateToken, WalkOptions, WalkOutcome};
