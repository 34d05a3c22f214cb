//! Promotion target-path resolution.
//!
//! Promotion references are either sibling-relative (`deploy.yml` next to the
//! owning document) or document-root-relative (`/deploy/prod.yml`). Paths are
//! plain `/`-separated strings; they never touch the filesystem.

/// Resolve a promotion reference against the owning document's path.
///
/// A reference starting with `/` is root-relative: the slash is stripped and
/// the rest returned as-is. Anything else replaces the final segment of
/// `owner_path`.
pub fn resolve_reference(owner_path: &str, reference: &str) -> String {
    if let Some(stripped) = reference.strip_prefix('/') {
        return stripped.to_string();
    }

    match owner_path.rsplit_once('/') {
        Some((dir, _file)) => format!("{dir}/{reference}"),
        None => reference.to_string(),
    }
}

/// The reference that makes `target_path` resolve from `owner_path`.
///
/// Inverse of [`resolve_reference`]: a sibling gets a bare file name, any
/// other target gets the root-relative form.
pub fn reference_for(owner_path: &str, target_path: &str) -> String {
    let owner_dir = owner_path.rsplit_once('/').map(|(dir, _)| dir);
    let target_split = target_path.rsplit_once('/');

    match (owner_dir, target_split) {
        (Some(od), Some((td, file))) if od == td => file.to_string(),
        (None, None) => target_path.to_string(),
        _ => format!("/{target_path}"),
    }
}
