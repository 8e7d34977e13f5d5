//! Entry resolver: nearest `package.json` and its `main` file.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, format_path, normalize_path};

pub const MANIFEST_FILE: &str = "package.json";

/// The parts of a package manifest the dispatcher cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
}

impl Manifest {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid manifest {:?}", path))
    }
}

/// Nearest directory at or above `start` that contains a `package.json`.
pub fn find_package_dir<R: Runtime>(runtime: &R, start: &Path) -> Result<Option<PathBuf>> {
    let start = if start.is_absolute() {
        normalize_path(start)
    } else {
        normalize_path(&runtime.current_dir()?.join(start))
    };

    Ok(start
        .ancestors()
        .find(|dir| runtime.exists(&dir.join(MANIFEST_FILE)))
        .map(Path::to_path_buf))
}

/// Resolve the entry file declared by the package containing `start`.
///
/// Returns `Ok(None)` when there is no manifest or it declares no `main`.
#[tracing::instrument(skip(runtime))]
pub fn resolve_entry_file<R: Runtime>(runtime: &R, start: &Path) -> Result<Option<PathBuf>> {
    let Some(dir) = find_package_dir(runtime, start)? else {
        debug!("No {} found at or above {:?}", MANIFEST_FILE, start);
        return Ok(None);
    };

    let manifest = Manifest::load(runtime, &dir.join(MANIFEST_FILE))?;
    match manifest.main.as_deref().map(str::trim) {
        Some(main) if !main.is_empty() => {
            let entry = format_path(&normalize_path(&dir.join(main)));
            debug!("Entry file of {:?} is {:?}", dir, entry);
            Ok(Some(entry))
        }
        _ => {
            debug!("{:?} declares no main entry", dir.join(MANIFEST_FILE));
            Ok(None)
        }
    }
}
