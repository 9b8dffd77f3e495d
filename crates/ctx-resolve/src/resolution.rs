//! Constraint resolution: many requirement tokens → one resolution.
//!
//! Strategy: an override wins outright. Otherwise exact tokens (commits,
//! tags, branches) must all agree byte-for-byte, and range-like tokens are
//! intersected against the remote's tag index, picking the newest version
//! that satisfies every range.

use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::remote::{Remote, TagIndex};
use crate::source::SourceIdentity;
use crate::token::{self, NamedRef, RangeToken, RequirementToken, Version};

/// The single concrete ref chosen for an identity in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: SourceIdentity,
    /// The token or merged range expression that produced this resolution.
    pub requested: Option<String>,
    /// Set only when the resolution came from a semver tag.
    pub version: Option<Version>,
    /// Commit the checkout must end up on.
    pub commit: String,
    /// Literal ref handed to the checkout: tag name, branch name, or commit hash.
    pub checkout: String,
}

/// Resolve every token asserted against `identity` into one resolution.
///
/// An `override_token` supersedes all other tokens unconditionally.
pub fn resolve(
    remote: &dyn Remote,
    identity: &SourceIdentity,
    tokens: &[RequirementToken],
    override_token: Option<&RequirementToken>,
) -> Result<Resolution> {
    if let Some(forced) = override_token.filter(|t| !t.is_empty()) {
        debug!(%identity, token = %forced, "resolving with override");
        let mut resolution = resolve_one(remote, identity, forced, &[forced.as_str().to_string()])?;
        resolution.requested = Some(forced.as_str().to_string());
        return Ok(resolution);
    }

    let tokens: Vec<&RequirementToken> = tokens.iter().filter(|t| !t.is_empty()).collect();
    let requested: Vec<String> = tokens.iter().map(|t| t.as_str().to_string()).collect();

    if tokens.is_empty() {
        return resolve_unconstrained(remote, identity);
    }

    if let Some(exact) = tokens.iter().find(|t| t.is_exact()) {
        if tokens.iter().any(|t| t.as_str() != exact.as_str()) {
            return Err(ResolveError::Conflict {
                identity: identity.to_string(),
                requested,
                detail: "exact refs must agree; add an override to force a single ref".to_string(),
            });
        }
        return resolve_one(remote, identity, exact, &requested);
    }

    let ranges: Vec<&RangeToken> = tokens
        .iter()
        .filter_map(|t| match t {
            RequirementToken::Range(r) => Some(r),
            _ => None,
        })
        .collect();

    if ranges.is_empty() {
        return resolve_one(remote, identity, &RequirementToken::Latest, &requested);
    }

    let tags = remote.list_tags(identity)?;
    let versions = tags.versions();
    let best = token::resolve_best(versions.keys(), &ranges).ok_or_else(|| {
        ResolveError::Conflict {
            identity: identity.to_string(),
            requested: requested.clone(),
            detail: format!(
                "no version satisfies every constraint; available: {}",
                describe_versions(versions.keys())
            ),
        }
    })?;

    let merged = ranges.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(" & ");
    debug!(%identity, %best, constraints = %merged, "selected newest compatible version");
    from_tag(identity, &tags, &best, Some(merged), &requested)
}

/// Resolve a single token on its own.
fn resolve_one(
    remote: &dyn Remote,
    identity: &SourceIdentity,
    token: &RequirementToken,
    requested: &[String],
) -> Result<Resolution> {
    let raw = Some(token.as_str().to_string());
    match token {
        RequirementToken::Empty => resolve_unconstrained(remote, identity),

        RequirementToken::Commit(hash) => Ok(Resolution {
            identity: identity.clone(),
            requested: raw,
            version: None,
            commit: hash.clone(),
            checkout: hash.clone(),
        }),

        RequirementToken::Latest => {
            let tags = remote.list_tags(identity)?;
            let best = token::resolve_best(tags.versions().keys(), &[]).ok_or_else(|| {
                ResolveError::NotFound {
                    identity: identity.to_string(),
                    requested: requested.to_vec(),
                    detail: "no semver tags found".to_string(),
                }
            })?;
            from_tag(identity, &tags, &best, raw, requested)
        }

        RequirementToken::Range(range) => {
            let tags = remote.list_tags(identity)?;
            let versions = tags.versions();
            let best = token::resolve_best(versions.keys(), &[range]).ok_or_else(|| {
                ResolveError::NotFound {
                    identity: identity.to_string(),
                    requested: requested.to_vec(),
                    detail: format!(
                        "no version satisfies {range}; available: {}",
                        describe_versions(versions.keys()),
                        range = range.as_str()
                    ),
                }
            })?;
            from_tag(identity, &tags, &best, raw, requested)
        }

        RequirementToken::Ref(NamedRef::Tag { name, version }) => {
            let tags = remote.list_tags(identity)?;
            let commit = tags.commit(name).ok_or_else(|| ResolveError::NotFound {
                identity: identity.to_string(),
                requested: requested.to_vec(),
                detail: format!("tag '{name}' not found"),
            })?;
            Ok(Resolution {
                identity: identity.clone(),
                requested: raw,
                version: Some(version.clone()),
                commit: commit.to_string(),
                checkout: name.clone(),
            })
        }

        RequirementToken::Ref(NamedRef::Branch(branch)) => {
            let commit = remote
                .resolve_branch_head(identity, branch)?
                .ok_or_else(|| ResolveError::NotFound {
                    identity: identity.to_string(),
                    requested: requested.to_vec(),
                    detail: format!("branch '{branch}' not found (or not accessible)"),
                })?;
            Ok(Resolution {
                identity: identity.clone(),
                requested: raw,
                version: None,
                commit,
                checkout: branch.clone(),
            })
        }
    }
}

/// No preference: newest release tag, else the default branch head.
fn resolve_unconstrained(remote: &dyn Remote, identity: &SourceIdentity) -> Result<Resolution> {
    let tags = remote.list_tags(identity)?;
    if let Some(best) = token::resolve_best(tags.versions().keys(), &[]) {
        return from_tag(identity, &tags, &best, None, &[]);
    }

    let branch = remote.default_branch(identity)?;
    debug!(%identity, %branch, "no semver tags; falling back to default branch");
    let commit = remote
        .resolve_branch_head(identity, &branch)?
        .ok_or_else(|| ResolveError::NotFound {
            identity: identity.to_string(),
            requested: Vec::new(),
            detail: format!("no semver tags and default branch '{branch}' not found"),
        })?;
    Ok(Resolution {
        identity: identity.clone(),
        requested: None,
        version: None,
        commit,
        checkout: branch,
    })
}

fn from_tag(
    identity: &SourceIdentity,
    tags: &TagIndex,
    version: &Version,
    requested: Option<String>,
    tokens: &[String],
) -> Result<Resolution> {
    let versions = tags.versions();
    let name = versions
        .get(version)
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("v{version}"));
    let commit = tags.commit(&name).ok_or_else(|| ResolveError::NotFound {
        identity: identity.to_string(),
        requested: tokens.to_vec(),
        detail: format!("could not find commit for tag {name}"),
    })?;
    Ok(Resolution {
        identity: identity.clone(),
        requested,
        version: Some(version.clone()),
        commit: commit.to_string(),
        checkout: name,
    })
}

fn describe_versions<'a>(versions: impl DoubleEndedIterator<Item = &'a Version>) -> String {
    let listed: Vec<String> = versions.rev().map(|v| v.to_string()).collect();
    if listed.is_empty() {
        "none".to_string()
    } else {
        listed.join(", ")
    }
}
