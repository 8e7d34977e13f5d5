//! Path utility functions for normalization and portable formatting.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // At root there is nothing to pop; keep the `..`
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

/// Format a path so it reads the same on every host.
///
/// On Windows the `\` separators are rewritten to `/`, which both Windows and
/// the JavaScript module loader accept. Other platforms are returned unchanged.
pub fn format_path(path: &Path) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '\\' {
        PathBuf::from(path.to_string_lossy().replace('\\', "/"))
    } else {
        path.to_path_buf()
    }
}
