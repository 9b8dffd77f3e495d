//! Dependency graph walker.
//!
//! Drives an explicit worklist over source identities in first-seen order:
//! each identity is resolved from the tokens accumulated so far, checked
//! out, and its declared dependencies are queued. The walk owns all of its
//! state; nothing is shared between walks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::declaration::Declaration;
use crate::error::{ResolveError, Result};
use crate::lock::{LockEntry, LockFile};
use crate::remote::Remote;
use crate::resolution::{self, Resolution};
use crate::source::{SourceIdentity, SourceSpec};
use crate::token::RequirementToken;

/// Every token asserted against one identity during a walk.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    tokens: Vec<RequirementToken>,
    /// Number of tokens held when the identity was resolved.
    frozen_at: Option<usize>,
}

impl ConstraintSet {
    pub fn push(&mut self, token: RequirementToken) {
        self.tokens.push(token);
    }

    pub fn tokens(&self) -> &[RequirementToken] {
        &self.tokens
    }

    pub fn is_resolved(&self) -> bool {
        self.frozen_at.is_some()
    }

    /// Tokens that arrived after the identity was already resolved.
    pub fn late(&self) -> &[RequirementToken] {
        match self.frozen_at {
            Some(n) => &self.tokens[n..],
            None => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Fail when a late-arriving token is not satisfied by the resolution
    /// already produced, instead of only reporting it.
    pub strict_late_tokens: bool,
}

/// One resolved source with what it declared.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub resolution: Resolution,
    pub depends: Vec<String>,
    pub path: PathBuf,
}

/// A token that arrived after its identity was resolved and that the
/// resolution does not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateToken {
    pub identity: SourceIdentity,
    pub token: String,
    pub resolved: String,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Resolved sources in resolution order.
    pub resolved: Vec<ResolvedSource>,
    pub late_tokens: Vec<LateToken>,
}

impl WalkOutcome {
    pub fn get(&self, identity: &SourceIdentity) -> Option<&ResolvedSource> {
        self.resolved.iter().find(|r| &r.resolution.identity == identity)
    }
}

/// Resolve `top_level` and everything it transitively declares.
///
/// Each resolution is upserted into `lock` as it is produced. The first
/// error aborts the walk; `lock` may then hold partial progress and must not
/// be persisted.
pub fn walk(
    remote: &dyn Remote,
    top_level: &[SourceSpec],
    overrides: &BTreeMap<SourceIdentity, RequirementToken>,
    options: WalkOptions,
    lock: &mut LockFile,
) -> Result<WalkOutcome> {
    let mut order: Vec<SourceIdentity> = Vec::new();
    let mut constraints: BTreeMap<SourceIdentity, ConstraintSet> = BTreeMap::new();
    for spec in top_level {
        assert_token(&mut order, &mut constraints, spec.clone());
    }

    let mut outcome = WalkOutcome::default();
    let mut cursor = 0;
    while cursor < order.len() {
        let identity = order[cursor].clone();
        cursor += 1;

        let set = constraints.entry(identity.clone()).or_default();
        set.frozen_at = Some(set.tokens.len());
        let override_token = overrides.get(&identity);
        let mut resolved = resolution::resolve(remote, &identity, set.tokens(), override_token)?;

        let path = remote.materialize(&identity, &resolved.checkout)?;
        let head = remote.head_commit(&path)?;
        if !head.starts_with(&resolved.commit) {
            return Err(ResolveError::Remote {
                identity: identity.to_string(),
                detail: format!(
                    "checkout of '{}' is at {head}, expected {}",
                    resolved.checkout, resolved.commit
                ),
            });
        }
        resolved.commit = head;

        let declaration = Declaration::load(&path)?;
        for spec in declaration.requirements()? {
            debug!(from = %identity, dependency = %spec, "declared dependency");
            assert_token(&mut order, &mut constraints, spec);
        }

        info!(
            %identity,
            checkout = %resolved.checkout,
            commit = %resolved.commit,
            "resolved source"
        );
        lock.upsert(LockEntry::from_resolution(
            &resolved,
            declaration.depends.clone(),
            Utc::now(),
        ));
        outcome.resolved.push(ResolvedSource {
            resolution: resolved,
            depends: declaration.depends,
            path,
        });
    }

    for source in &outcome.resolved {
        let identity = &source.resolution.identity;
        if overrides.contains_key(identity) {
            continue;
        }
        let Some(set) = constraints.get(identity) else {
            continue;
        };
        for token in set.late() {
            if satisfied_by(token, &source.resolution) {
                continue;
            }
            let late = LateToken {
                identity: identity.clone(),
                token: token.as_str().to_string(),
                resolved: source.resolution.checkout.clone(),
            };
            if options.strict_late_tokens {
                let mut requested: Vec<String> =
                    set.tokens().iter().map(|t| t.as_str().to_string()).collect();
                requested.retain(|t| !t.is_empty());
                return Err(ResolveError::Conflict {
                    identity: identity.to_string(),
                    requested,
                    detail: format!(
                        "'{}' was declared after resolving to {}; add an override to pin one ref",
                        late.token, late.resolved
                    ),
                });
            }
            warn!(
                %identity,
                token = %late.token,
                resolved = %late.resolved,
                "requirement arrived after resolution and is not satisfied"
            );
            outcome.late_tokens.push(late);
        }
    }

    Ok(outcome)
}

fn assert_token(
    order: &mut Vec<SourceIdentity>,
    constraints: &mut BTreeMap<SourceIdentity, ConstraintSet>,
    spec: SourceSpec,
) {
    let set = constraints.entry(spec.identity.clone()).or_insert_with(|| {
        order.push(spec.identity.clone());
        ConstraintSet::default()
    });
    set.push(spec.token);
}

/// Whether an already-produced resolution honors `token`.
fn satisfied_by(token: &RequirementToken, resolution: &Resolution) -> bool {
    match token {
        RequirementToken::Empty => true,
        RequirementToken::Latest => resolution.version.is_some(),
        RequirementToken::Range(range) => {
            resolution.version.as_ref().is_some_and(|v| range.matches(v))
        }
        RequirementToken::Commit(hash) => resolution.commit.starts_with(hash.as_str()),
        RequirementToken::Ref(_) => token.as_str() == resolution.checkout,
    }
}
