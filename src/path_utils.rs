//! Cross-platform path utilities
//!
//! Asset files come from bundle descriptors written by third parties, so every
//! declared path is checked to stay inside the folder it is served from.

use std::path::{Component, Path, PathBuf};

use normpath::PathExt;

/// Characters that would be read as route syntax when a path becomes a URL
const ROUTE_META_CHARS: &[char] = &[':', '*', '{', '}'];

/// Convert path separators to forward slashes for URLs
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Whether a relative path is made only of normal components
///
/// Rejects absolute paths, drive prefixes and any `..` component, even one
/// that would stay inside the root after normalization.
pub fn is_plain_relative(relative: &Path) -> bool {
    relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether a relative path contains characters with a meaning in routes
pub fn has_route_meta_chars(relative: &str) -> bool {
    relative.contains(ROUTE_META_CHARS)
}

/// Resolve a path as canonically as possible
///
/// Existing paths are canonicalized (following symlinks); missing paths are
/// resolved through their parent, falling back to the path itself.
fn canonical_or_self(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(parent) = dunce::canonicalize(parent) {
            return parent.join(name);
        }
    }
    path.normalize()
        .map(normpath::BasePathBuf::into_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Join `relative` onto `root` if the result stays inside `root`
///
/// Returns `None` for paths that escape the root lexically or through a
/// symlink.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative_path = Path::new(relative);
    if !is_plain_relative(relative_path) {
        return None;
    }

    let joined = root.join(relative_path);
    let root_canonical = canonical_or_self(root);
    if canonical_or_self(&joined).starts_with(&root_canonical) {
        Some(joined)
    } else {
        None
    }
}
