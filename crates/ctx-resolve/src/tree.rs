//! Dependency tree display.
//!
//! Rebuilds the dependency tree from lock entries and formats it:
//! ```text
//! my-project
//! ├── github.com/org/ctx-a v1.2.0 @ 3f2a91c
//! │   └── github.com/org/ctx-base v0.4.1 @ 77e0c12
//! ├── github.com/org/ctx-b main @ 9a0b1c2
//! │   └── github.com/org/ctx-base v0.4.1 @ 77e0c12 (shared)
//! └── github.com/org/ctx-c v2.0.0 @ 5d6e7f8
//! ```

use std::collections::BTreeSet;

use crate::lock::{LockEntry, LockFile};
use crate::source::SourceIdentity;

/// Format the tree of `roots` and everything they depend on.
pub fn format_tree(root_label: &str, roots: &[SourceIdentity], lock: &LockFile) -> String {
    let mut out = format!("{root_label}\n");
    let mut seen = BTreeSet::new();
    let mut path = Vec::new();
    let mut total = 0;

    let count = roots.len();
    for (i, root) in roots.iter().enumerate() {
        let is_last = i == count - 1;
        format_node(
            &mut out,
            lock,
            root,
            "",
            is_last,
            &mut seen,
            &mut path,
            &mut total,
        );
    }

    out.push_str(&format!(
        "\n{total} dependencies ({} unique)\n",
        seen.len()
    ));
    out
}

#[allow(clippy::too_many_arguments)]
fn format_node(
    out: &mut String,
    lock: &LockFile,
    identity: &SourceIdentity,
    prefix: &str,
    is_last: bool,
    seen: &mut BTreeSet<SourceIdentity>,
    path: &mut Vec<SourceIdentity>,
    total: &mut usize,
) {
    *total += 1;
    let connector = if is_last { "└── " } else { "├── " };
    let entry = lock.get(identity);
    let label = match entry {
        Some(entry) => describe(entry),
        None => format!("{identity} (not locked)"),
    };

    if path.contains(identity) {
        out.push_str(&format!("{prefix}{connector}{label} (cycle)\n"));
        return;
    }
    if !seen.insert(identity.clone()) {
        out.push_str(&format!("{prefix}{connector}{label} (shared)\n"));
        return;
    }
    out.push_str(&format!("{prefix}{connector}{label}\n"));

    let Some(entry) = entry else {
        return;
    };
    let children = entry.dependency_identities();
    let child_prefix = if is_last {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };

    path.push(identity.clone());
    let child_count = children.len();
    for (i, child) in children.iter().enumerate() {
        format_node(
            out,
            lock,
            child,
            &child_prefix,
            i == child_count - 1,
            seen,
            path,
            total,
        );
    }
    path.pop();
}

fn describe(entry: &LockEntry) -> String {
    match &entry.version {
        Some(version) => format!("{} v{version} @ {}", entry.identity, entry.short_commit()),
        None => format!("{} @ {}", entry.identity, entry.short_commit()),
    }
}

/// Format a flat list of every locked source (lock file order).
pub fn format_lock(lock: &LockFile) -> String {
    let mut out = String::new();
    for entry in lock.entries() {
        let requested = entry
            .requested
            .as_deref()
            .map(|r| format!(" (requested {r})"))
            .unwrap_or_default();
        out.push_str(&format!("{}{requested}\n", describe(entry)));
    }
    out
}
