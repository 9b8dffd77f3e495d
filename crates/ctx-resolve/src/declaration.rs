//! Dependency declarations published by context sources.
//!
//! A source declares its own requirements in `context.toml` at the root of
//! its checkout, or in the older `context.yaml`. Both carry the same flat
//! shape:
//!
//! ```toml
//! name = "ctx-a"
//! version = "1.0.0"
//! depends = ["github.com/org/ctx-b@^1.0.0"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ResolveError, Result};
use crate::source::SourceSpec;

/// Declaration file name, preferred when present.
pub const CONTEXT_TOML: &str = "context.toml";

/// Legacy YAML declaration file names.
pub const CONTEXT_YAML: [&str; 2] = ["context.yaml", "context.yml"];

/// What a source says about itself at one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Self-reported semantic version (informational only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Requirement strings in `identity[@token]` form.
    #[serde(default)]
    pub depends: Vec<String>,
}

impl Declaration {
    /// Parse a declaration from a TOML string.
    pub fn parse_toml(input: &str) -> Result<Self> {
        let declaration: Declaration = toml::from_str(input)?;
        declaration.validate()
    }

    /// Parse a declaration from a YAML string.
    pub fn parse_yaml(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Declaration::default());
        }
        let declaration: Declaration = serde_yaml_ng::from_str(input)?;
        declaration.validate()
    }

    /// Load the declaration from a checkout directory.
    ///
    /// A source without any declaration file declares nothing.
    pub fn load(dir: &Path) -> Result<Self> {
        let toml_path = dir.join(CONTEXT_TOML);
        if toml_path.is_file() {
            return Self::parse_toml(&std::fs::read_to_string(&toml_path)?);
        }
        for name in CONTEXT_YAML {
            let yaml_path = dir.join(name);
            if yaml_path.is_file() {
                return Self::parse_yaml(&std::fs::read_to_string(&yaml_path)?);
            }
        }
        Ok(Declaration::default())
    }

    /// Parse every declared dependency.
    pub fn requirements(&self) -> Result<Vec<SourceSpec>> {
        self.depends.iter().map(|d| SourceSpec::parse(d)).collect()
    }

    /// Serialize this declaration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(self) -> Result<Self> {
        if let Some(version) = &self.version {
            if let Err(e) = semver::Version::parse(version.trim_start_matches('v')) {
                warn!(%version, error = %e, "declared version is not semver; ignoring it");
            }
        }
        for dep in &self.depends {
            SourceSpec::parse(dep).map_err(|e| ResolveError::Parse {
                detail: format!("declared dependency '{dep}': {e}"),
            })?;
        }
        Ok(self)
    }
}
