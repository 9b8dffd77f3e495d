//! Coordination error types.

use chrono::{DateTime, Utc};

/// Errors from acquiring or releasing a scope lock.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    /// Another holder owns the scope and its lease has not expired.
    #[error("scope '{scope}' is held by '{holder}' until {expires_at}")]
    LockConflict {
        scope: String,
        holder: String,
        expires_at: DateTime<Utc>,
    },

    /// Scope names become file names and are restricted accordingly.
    #[error("invalid scope name '{0}'")]
    InvalidScope(String),

    /// Lock record could not be read or written.
    #[error("lock record error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for coordination operations.
pub type Result<T> = std::result::Result<T, CoordError>;
