//! git-backed checkout capability for ctx.
//!
//! [`GitRemote`] answers tag and branch queries with `git ls-remote` and
//! materializes sources under the project's packages directory, either as
//! submodules of the project repository or as plain clones. Every `git`
//! call runs under a deadline; a call that overruns is killed and reported
//! as a retryable remote error.

pub mod command;
pub mod error;
pub mod remote;
pub mod url;

pub use command::{git_available, Git};
pub use error::{GitError, Result};
pub use remote::{CheckoutMode, GitRemote};
pub use url::{install_path, repo_url};
