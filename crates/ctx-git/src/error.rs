//! git invocation errors.

use std::time::Duration;

use ctx_resolve::ResolveError;

/// Errors from running the `git` executable.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// `git` could not be started at all.
    #[error("failed to run git: {0}")]
    Spawn(std::io::Error),

    /// `git` ran and exited unsuccessfully.
    #[error("git {args} failed ({status}): {stderr}")]
    Failed {
        args: String,
        status: String,
        stderr: String,
    },

    /// `git` did not finish before the deadline and was killed.
    #[error("git {args} timed out after {}s", .timeout.as_secs())]
    Timeout { args: String, timeout: Duration },

    /// A ref could not be found in a local checkout.
    #[error("cannot find '{reference}' in {path}")]
    UnknownRef { reference: String, path: String },

    /// I/O error around a checkout.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for git operations.
pub type Result<T> = std::result::Result<T, GitError>;

impl GitError {
    /// Attach the identity the failing call was made for.
    pub fn for_identity(self, identity: impl std::fmt::Display) -> ResolveError {
        ResolveError::Remote {
            identity: identity.to_string(),
            detail: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_a_retryable_remote_error() {
        let err = GitError::Timeout {
            args: "ls-remote --tags".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "git ls-remote --tags timed out after 5s");
        let resolved = err.for_identity("github.com/org/ctx");
        assert!(resolved.is_retryable());
        assert_eq!(resolved.identity(), Some("github.com/org/ctx"));
    }
}
