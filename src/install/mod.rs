//! Install mechanism.
//!
//! Places registry packages into the version-addressed store and links them
//! into a project's `node_modules`.

mod lock;
mod npm;
mod staging;
mod symlink;
mod tarball;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use lock::{DEFAULT_LOCK_TIMEOUT, InstallLock};
pub use npm::NpmInstaller;
pub use staging::StagingDir;
pub use symlink::link_package;
pub use tarball::{unpack_package, verify_integrity};

#[cfg(test)]
pub(crate) use tarball::tests::{create_tgz, sha512_integrity};

/// Directory inside the store holding install lock files.
pub const LOCKS_DIR: &str = ".locks";

/// One package to install. `version` may be an exact version, a range or `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub name: String,
    pub version: String,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install `pkgs` (and their dependencies) into `store_dir`, linking each
    /// requested package under `<root>/node_modules`.
    async fn install_packages(
        &self,
        root: &Path,
        store_dir: &Path,
        registry_url: &str,
        pkgs: &[PackageRequest],
    ) -> Result<()>;
}
