//! Mapping from source identities to clone URLs and install paths.

use std::path::PathBuf;

/// The URL git should clone for `identity`.
///
/// URLs and local paths pass through; bare `host/path` identities become
/// `https://host/path.git`.
pub fn repo_url(identity: &str) -> String {
    let passthrough = ["http://", "https://", "git@", "file://"]
        .iter()
        .any(|p| identity.starts_with(p));
    if passthrough || is_local_path(identity) {
        identity.to_string()
    } else {
        format!("https://{identity}.git")
    }
}

/// Directory for `identity`, relative to the packages directory.
pub fn install_path(identity: &str) -> PathBuf {
    let mut rel = identity
        .strip_prefix("https://")
        .or_else(|| identity.strip_prefix("http://"))
        .unwrap_or(identity)
        .to_string();
    if let Some(rest) = rel.strip_prefix("file://") {
        rel = format!("file/{}", rest.trim_start_matches('/'));
    }
    if is_local_path(&rel) {
        rel = format!("local/{}", rel.trim_start_matches(['.', '/']));
    }
    let rel = rel.strip_suffix(".git").unwrap_or(&rel);
    let rel = rel.trim_end_matches('/').replace([':', '\\'], "_");

    // `..` components would escape the packages directory.
    rel.split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect()
}

fn is_local_path(identity: &str) -> bool {
    identity.starts_with('.') || identity.starts_with('/') || identity.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_identity_becomes_https() {
        assert_eq!(repo_url("github.com/org/ctx"), "https://github.com/org/ctx.git");
    }

    #[test]
    fn urls_and_paths_pass_through() {
        for id in [
            "https://github.com/org/ctx.git",
            "git@github.com:org/ctx.git",
            "file:///srv/ctx",
            "/srv/repos/ctx",
            "./vendor/ctx",
        ] {
            assert_eq!(repo_url(id), id);
        }
    }

    #[test]
    fn install_paths() {
        assert_eq!(install_path("github.com/org/ctx"), PathBuf::from("github.com/org/ctx"));
        assert_eq!(
            install_path("https://github.com/org/ctx.git"),
            PathBuf::from("github.com/org/ctx")
        );
        assert_eq!(
            install_path("git@github.com:org/ctx.git"),
            PathBuf::from("git@github.com_org/ctx")
        );
        assert_eq!(install_path("file:///srv/ctx"), PathBuf::from("file/srv/ctx"));
        assert_eq!(install_path("/tmp/ctx-a"), PathBuf::from("local/tmp/ctx-a"));
        assert_eq!(install_path("../up/ctx"), PathBuf::from("local/up/ctx"));
    }
}
