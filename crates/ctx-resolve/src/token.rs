//! Requirement tokens and semantic-version helpers.
//!
//! A requirement token is the suffix of `identity@token`. Its shape is
//! decided once, here, and carried as a [`RequirementToken`] variant so the
//! resolver never re-sniffs strings.
//!
//! Range grammar is the `semver` crate's, extended with the forms common in
//! package manifests: whitespace-joined comparators (`>=1.0.0 <2.0.0`),
//! hyphen ranges, `||` unions, and operator-less versions read as exact
//! (`1.2.0`) or as spanning their last component (`1.2`, `1`).

use std::fmt;

use crate::error::{ResolveError, Result};

/// A parsed semantic version.
pub type Version = semver::Version;

/// A single range expression (one alternative of a [`RangeSet`]).
pub type VersionReq = semver::VersionReq;

/// A union of version requirements; matches if any alternative matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet {
    alternatives: Vec<VersionReq>,
}

impl RangeSet {
    /// Parse a range expression such as `^1.2`, `>=1.0.0 <2.0.0`, or `1.x || 2.x`.
    pub fn parse(input: &str) -> std::result::Result<Self, semver::Error> {
        let alternatives = input
            .split("||")
            .map(|part| parse_alternative(part.trim()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(RangeSet { alternatives })
    }

    /// Check if a version satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn parse_alternative(part: &str) -> std::result::Result<VersionReq, semver::Error> {
    let words: Vec<&str> = part
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();

    // Hyphen range: `1.0.0 - 2.0.0`.
    if let [low, "-", high] = words.as_slice() {
        return VersionReq::parse(&format!(">={low}, <={high}"));
    }

    // Re-attach bare operators (`>= 1.0.0`) before joining with commas.
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for word in words {
        if is_operator(word) {
            if pending_op.replace(word).is_some() {
                return VersionReq::parse(part);
            }
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{op}{word}")),
            None => comparators.push(bare_comparator(word)),
        }
    }
    if pending_op.is_some() || comparators.is_empty() {
        // Let the parser report the error.
        return VersionReq::parse(part);
    }
    VersionReq::parse(&comparators.join(", "))
}

fn is_operator(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^'))
}

/// A comparator without an operator: a full version is exact, a partial
/// one spans its last given component (`1.2` is `>=1.2.0, <1.3.0`).
fn bare_comparator(word: &str) -> String {
    if word.starts_with(|c: char| matches!(c, '<' | '>' | '=' | '~' | '^')) {
        return word.to_string();
    }
    let core = word.split(['-', '+']).next().unwrap_or(word);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.iter().any(|p| matches!(*p, "x" | "X" | "*")) {
        return word.to_string();
    }
    match parts.len() {
        1 => format!("{word}.*"),
        2 => format!("~{word}"),
        _ => format!("={word}"),
    }
}

/// A range-like token's original text together with its parsed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeToken {
    raw: String,
    set: RangeSet,
}

impl RangeToken {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.set.matches(version)
    }
}

/// An exact, named ref: a `v<semver>` tag or a branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedRef {
    /// Exact tag following the `v<semver>` convention.
    Tag { name: String, version: Version },
    /// Anything else; resolved by existence on the remote.
    Branch(String),
}

/// One requirement asserted against a source identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementToken {
    /// No preference.
    Empty,
    /// A 7–40 character hexadecimal commit hash.
    Commit(String),
    /// The literal `latest`.
    Latest,
    /// A semantic-version range.
    Range(RangeToken),
    /// An exact tag or branch name.
    Ref(NamedRef),
}

impl RequirementToken {
    /// Classify a raw token string.
    ///
    /// Order: empty, commit hash, `latest`, `v<semver>` tag, semver range,
    /// branch. Strings that fit none of these and are not usable as a git
    /// ref name are rejected.
    pub fn classify(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(RequirementToken::Empty);
        }
        if looks_like_commit(raw) {
            // git prints hashes in lowercase.
            return Ok(RequirementToken::Commit(raw.to_ascii_lowercase()));
        }
        if raw == "latest" {
            return Ok(RequirementToken::Latest);
        }
        if let Some(version) = tag_version(raw).filter(|_| raw.starts_with('v')) {
            return Ok(RequirementToken::Ref(NamedRef::Tag {
                name: raw.to_string(),
                version,
            }));
        }
        if let Ok(set) = RangeSet::parse(raw) {
            return Ok(RequirementToken::Range(RangeToken {
                raw: raw.to_string(),
                set,
            }));
        }
        if !is_valid_ref_name(raw) {
            return Err(ResolveError::Parse {
                detail: format!("'{raw}' is not a version range, tag, commit, or branch name"),
            });
        }
        Ok(RequirementToken::Ref(NamedRef::Branch(raw.to_string())))
    }

    /// The token text as written by the user (`""` for no preference).
    pub fn as_str(&self) -> &str {
        match self {
            RequirementToken::Empty => "",
            RequirementToken::Commit(hash) => hash,
            RequirementToken::Latest => "latest",
            RequirementToken::Range(range) => range.as_str(),
            RequirementToken::Ref(NamedRef::Tag { name, .. }) => name,
            RequirementToken::Ref(NamedRef::Branch(name)) => name,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequirementToken::Empty)
    }

    /// Commit hashes, tags, and branches pin a single ref.
    pub fn is_exact(&self) -> bool {
        matches!(self, RequirementToken::Commit(_) | RequirementToken::Ref(_))
    }

    /// Ranges and `latest` select from the tag index.
    pub fn is_range_like(&self) -> bool {
        matches!(self, RequirementToken::Range(_) | RequirementToken::Latest)
    }
}

impl fmt::Display for RequirementToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit hashes are 7 to 40 hexadecimal characters.
pub fn looks_like_commit(s: &str) -> bool {
    (7..=40).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// The semantic version named by a tag, stripping one leading `v`.
pub fn tag_version(tag: &str) -> Option<Version> {
    Version::parse(tag.strip_prefix('v').unwrap_or(tag)).ok()
}

/// Parse a version string like "1.2.3".
pub fn parse_version(s: &str) -> std::result::Result<Version, semver::Error> {
    Version::parse(s)
}

/// Find the highest version satisfying every range simultaneously.
///
/// With no ranges at all, pre-releases are skipped: "newest" means newest
/// release.
pub fn resolve_best<'a>(
    available: impl IntoIterator<Item = &'a Version>,
    ranges: &[&RangeToken],
) -> Option<Version> {
    available
        .into_iter()
        .filter(|v| {
            if ranges.is_empty() {
                v.pre.is_empty()
            } else {
                ranges.iter().all(|r| r.matches(v))
            }
        })
        .max()
        .cloned()
}

// Subset of git-check-ref-format rules.
fn is_valid_ref_name(name: &str) -> bool {
    !name.starts_with('-')
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.ends_with('.')
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("@{")
        && !name.contains("//")
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
}
