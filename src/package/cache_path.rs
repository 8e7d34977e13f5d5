//! Version cache path builder.
//!
//! Layout of one cached package version inside the store:
//!
//! `<store_dir>/_<sanitized name>@<version>@<name>`
//!
//! For scoped names the trailing `<name>` keeps its `/`, so
//! `@scope/tool@1.0.0` lives at `<store_dir>/_@scope_tool@1.0.0@@scope/tool`.

use std::path::{Path, PathBuf};

/// Replace path separators so the name fits in a single path segment.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Directory name (relative to the store) of one package version.
pub fn cache_dir_name(name: &str, version: &str) -> String {
    format!("_{}@{}@{}", sanitize_name(name), version, name)
}

/// Absolute cache directory of `name@version` inside `store_dir`.
pub fn cache_path(store_dir: &Path, name: &str, version: &str) -> PathBuf {
    store_dir.join(cache_dir_name(name, version))
}

/// Single-segment key for `name@version`, used for lock and staging files.
pub fn flat_key(name: &str, version: &str) -> String {
    format!("_{}@{}", sanitize_name(name), version)
}
