//! Resolution error types.

/// Errors that can occur while resolving, locking, or replaying sources.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Malformed requirement string, declaration, or lock document.
    #[error("parse error: {detail}")]
    Parse { detail: String },

    /// Tag, branch, or commit absent on the remote.
    #[error("not found for '{identity}': {detail} (requested: {})", join_tokens(.requested))]
    NotFound {
        identity: String,
        requested: Vec<String>,
        detail: String,
    },

    /// Requirement tokens for one identity cannot be satisfied together.
    #[error("conflicting requirements for '{identity}': {} ({detail})", join_tokens(.requested))]
    Conflict {
        identity: String,
        requested: Vec<String>,
        detail: String,
    },

    /// An operation's precondition does not hold (e.g. frozen install without a lock).
    #[error("precondition failed: {detail}")]
    Precondition { detail: String },

    /// Transient failure reported by the checkout capability.
    #[error("remote error for '{identity}': {detail}")]
    Remote { identity: String, detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Semver parse error.
    #[error("invalid version: {0}")]
    Semver(#[from] semver::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Whether a caller may retry the failed operation.
    ///
    /// Only remote failures are transient; everything else is deterministic
    /// given the same inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Remote { .. })
    }

    /// The identity this error is about, if any.
    pub fn identity(&self) -> Option<&str> {
        match self {
            ResolveError::NotFound { identity, .. }
            | ResolveError::Conflict { identity, .. }
            | ResolveError::Remote { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// Every requirement token that contributed to a conflict or lookup failure.
    pub fn requested(&self) -> &[String] {
        match self {
            ResolveError::NotFound { requested, .. } | ResolveError::Conflict { requested, .. } => {
                requested
            }
            _ => &[],
        }
    }
}

fn join_tokens(tokens: &[String]) -> String {
    if tokens.is_empty() {
        "<none>".to_string()
    } else {
        tokens.join(", ")
    }
}

/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
