//! Path utility functions for normalization, containment and manifest references.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the file system and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
///
/// `/root/pkgs/../../etc` is NOT under `/root/pkgs`, even though it shares the prefix.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Build a manifest reference: the path of `target` relative to `root`,
/// always joined with forward slashes so references are portable.
///
/// Returns `None` if `target` is not under `root`.
pub fn manifest_reference(root: &Path, target: &Path) -> Option<String> {
    if !is_path_under(target, root) {
        return None;
    }
    let relative = pathdiff::diff_paths(normalize_path(target), normalize_path(root))?;
    if relative.is_absolute() {
        return None;
    }

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Resolve a manifest reference produced by [`manifest_reference`] back to a path under `root`.
pub fn resolve_reference(root: &Path, reference: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in reference.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    normalize_path(&path)
}
