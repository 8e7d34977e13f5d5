//! Scratch directories for in-progress installs.

use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Scratch directory an install is assembled in before it is renamed into
/// the store. Whatever is left in it is removed on drop, so a failed install
/// leaves no half-written cache entry behind.
pub struct StagingDir<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> StagingDir<'a, R> {
    /// Create an empty staging directory, clearing leftovers of an earlier crash.
    pub fn create(runtime: &'a R, path: PathBuf) -> Result<Self> {
        if runtime.exists(&path) {
            debug!("Removing stale staging directory {:?}", path);
            runtime.remove_dir_all(&path)?;
        }
        runtime.create_dir_all(&path)?;
        Ok(Self { runtime, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> Drop for StagingDir<'_, R> {
    fn drop(&mut self) {
        if !self.runtime.exists(&self.path) {
            return;
        }
        debug!("Cleaning up: {:?}", self.path);
        if let Err(e) = self.runtime.remove_dir_all(&self.path) {
            warn!("Failed to remove staging directory {:?}: {}", self.path, e);
        }
    }
}
