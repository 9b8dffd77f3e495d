//! Source requirement strings: `identity[@requirement]`.
//!
//! The identity names a host+path to a version-controlled repository
//! (optionally a sub-path inside a monorepo); the optional suffix after the
//! last `@` is the requirement token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};
use crate::token::RequirementToken;

/// Normalized name of one context source. Primary key of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceIdentity(String);

impl SourceIdentity {
    /// Create an identity, trimming surrounding whitespace.
    pub fn new(identity: impl AsRef<str>) -> Result<Self> {
        let trimmed = identity.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ResolveError::Parse {
                detail: "source identity is empty".to_string(),
            });
        }
        Ok(SourceIdentity(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A parsed `identity[@requirement]` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub identity: SourceIdentity,
    pub token: RequirementToken,
}

impl SourceSpec {
    /// Parse a requirement string such as `github.com/org/repo@^1.0`.
    ///
    /// The split happens at the last `@` past the first character, so
    /// `git@host:org/repo` keeps its user part. An empty suffix means
    /// "no preference".
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (identity, token) = match input.rfind('@') {
            Some(at) if at > 0 => (&input[..at], &input[at + 1..]),
            _ => (input, ""),
        };

        // `git@host:path` with no token: the only `@` belongs to the identity.
        let (identity, token) = if token.contains(':') {
            (input, "")
        } else {
            (identity, token)
        };

        Ok(SourceSpec {
            identity: SourceIdentity::new(identity)?,
            token: RequirementToken::classify(token)?,
        })
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token.as_str() {
            "" => write!(f, "{}", self.identity),
            token => write!(f, "{}@{token}", self.identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_identity_with_range() {
        let spec = SourceSpec::parse("github.com/org/repo@^1.0").unwrap();
        assert_eq!(spec.identity.as_str(), "github.com/org/repo");
        assert!(spec.token.is_range_like());
        assert_eq!(spec.token.as_str(), "^1.0");
    }

    #[test]
    fn parse_monorepo_subpath_with_tag() {
        let spec = SourceSpec::parse("github.com/org/mono/path/to/ctx@v1.2.3").unwrap();
        assert_eq!(spec.identity.as_str(), "github.com/org/mono/path/to/ctx");
        assert!(spec.token.is_exact());
    }

    #[test]
    fn parse_without_token() {
        let spec = SourceSpec::parse("  github.com/org/repo  ").unwrap();
        assert_eq!(spec.identity.as_str(), "github.com/org/repo");
        assert_eq!(spec.token, RequirementToken::Empty);
        assert_eq!(spec.to_string(), "github.com/org/repo");
    }

    #[test]
    fn trailing_at_means_no_preference() {
        let spec = SourceSpec::parse("github.com/org/repo@").unwrap();
        assert_eq!(spec.token, RequirementToken::Empty);
    }

    #[test]
    fn ssh_identity_keeps_user_part() {
        let spec = SourceSpec::parse("git@github.com:org/repo").unwrap();
        assert_eq!(spec.identity.as_str(), "git@github.com:org/repo");
        assert_eq!(spec.token, RequirementToken::Empty);

        let spec = SourceSpec::parse("git@github.com:org/repo@main").unwrap();
        assert_eq!(spec.identity.as_str(), "git@github.com:org/repo");
        assert_eq!(spec.token.as_str(), "main");
    }

    #[test]
    fn leading_at_is_part_of_identity() {
        let spec = SourceSpec::parse("@scope/ctx").unwrap();
        assert_eq!(spec.identity.as_str(), "@scope/ctx");
    }

    #[test]
    fn reject_empty_identity() {
        assert!(SourceSpec::parse("").is_err());
        assert!(SourceSpec::parse("   ").is_err());
    }

    #[test]
    fn display_round_trips() {
        let spec = SourceSpec::parse("/tmp/ctx-a@^1.0.0").unwrap();
        assert_eq!(spec.to_string(), "/tmp/ctx-a@^1.0.0");
    }
}
