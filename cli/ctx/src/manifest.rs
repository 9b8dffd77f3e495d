//! `.context/manifest.toml` parsing and project configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use ctx_resolve::{InstallRequest, ProjectLayout, RequirementToken, SourceIdentity, SourceSpec};
use serde::{Deserialize, Serialize};

/// The project manifest: which sources to install and how.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextManifest {
    /// Top-level requirement strings in `identity[@token]` form.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Forced tokens per identity, bypassing constraint merging.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub install: InstallConfig,
}

/// `[install]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Deadline for each git call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lease on the `install` scope lock, in seconds.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_lock_ttl_secs() -> u64 {
    600
}

impl Default for InstallConfig {
    fn default() -> Self {
        InstallConfig {
            timeout_secs: default_timeout_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl InstallConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl ContextManifest {
    /// Search upward from `start_dir` for `.context/manifest.toml`, parse it
    /// and return it with the project it belongs to.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, ProjectLayout)>> {
        let Some(layout) = ProjectLayout::discover(start_dir) else {
            return Ok(None);
        };
        let manifest = Self::load(&layout.manifest_path())?;
        Ok(Some((manifest, layout)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Parse sources and overrides into an install request.
    pub fn request(&self) -> Result<InstallRequest> {
        let sources = self
            .sources
            .iter()
            .map(|s| SourceSpec::parse(s).with_context(|| format!("invalid source '{s}'")))
            .collect::<Result<Vec<_>>>()?;

        let mut overrides = BTreeMap::new();
        for (identity, token) in &self.overrides {
            let id = SourceIdentity::new(identity)
                .with_context(|| format!("invalid override identity '{identity}'"))?;
            let token = RequirementToken::classify(token)
                .with_context(|| format!("invalid override for '{identity}'"))?;
            overrides.insert(id, token);
        }
        Ok(InstallRequest { sources, overrides })
    }

    /// Identities named directly by the manifest, in order, deduplicated.
    pub fn top_level_identities(&self) -> Result<Vec<SourceIdentity>> {
        let mut out: Vec<SourceIdentity> = Vec::new();
        for spec in self.request()?.sources {
            if !out.contains(&spec.identity) {
                out.push(spec.identity);
            }
        }
        Ok(out)
    }

    /// Default manifest written by `ctx init`.
    ///
    /// Kept free of comments: `ctx add` rewrites the file through
    /// `toml::Table`, which does not preserve them.
    pub fn template() -> String {
        r#"sources = []

[overrides]

[install]
timeout_secs = 60
lock_ttl_secs = 600
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let manifest = ContextManifest::parse(
            r#"
sources = ["github.com/org/ctx-a@^1.0", "github.com/org/ctx-b"]

[overrides]
"github.com/org/ctx-base" = "v1.0.0"

[install]
timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(manifest.sources.len(), 2);
        assert_eq!(manifest.install.timeout(), Duration::from_secs(5));
        assert_eq!(manifest.install.lock_ttl_secs, 600);

        let request = manifest.request().unwrap();
        assert_eq!(request.sources.len(), 2);
        let base = SourceIdentity::new("github.com/org/ctx-base").unwrap();
        assert_eq!(request.overrides[&base].as_str(), "v1.0.0");
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = ContextManifest::parse("").unwrap();
        assert!(manifest.sources.is_empty());
        assert_eq!(manifest.install, InstallConfig::default());
    }

    #[test]
    fn reject_invalid_source() {
        let manifest =
            ContextManifest::parse(r#"sources = ["github.com/org/x@not valid"]"#).unwrap();
        assert!(manifest.request().is_err());
    }

    #[test]
    fn top_level_identities_are_unique() {
        let manifest = ContextManifest::parse(
            r#"sources = ["x.example/a@^1", "x.example/a@<1.5", "x.example/b"]"#,
        )
        .unwrap();
        let ids = manifest.top_level_identities().unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), "x.example/a");
    }

    #[test]
    fn template_is_valid_toml() {
        let template = ContextManifest::template();
        let manifest = ContextManifest::parse(&template).unwrap();
        assert!(manifest.sources.is_empty());
        assert!(manifest.overrides.is_empty());
        assert!(!template.contains('#'));
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        std::fs::create_dir_all(layout.context_dir()).unwrap();
        std::fs::write(layout.manifest_path(), "sources = [\"x.example/a\"]\n").unwrap();
        let sub = dir.path().join("docs").join("deep");
        std::fs::create_dir_all(&sub).unwrap();

        let (manifest, found) = ContextManifest::find_and_load(&sub).unwrap().unwrap();
        assert_eq!(found, layout);
        assert_eq!(manifest.sources, vec!["x.example/a".to_string()]);
    }
}
