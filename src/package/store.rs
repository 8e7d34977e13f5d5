//! Package store: one package, one version, in the shared store or a target directory.

use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;

use super::cache_path::cache_path;
use super::entry::resolve_entry_file;
use super::spec::{PackageSpec, PackageVersion};
use crate::error::ExecError;
use crate::install::{Installer, PackageRequest};
use crate::registry::Registry;
use crate::runtime::Runtime;

/// A package resolution request bound to its collaborators.
///
/// With a store directory the package lives at its version cache path and is
/// installed on demand. Without one, `target_path` is used as-is and is
/// never installed into.
pub struct Package<'a, R: Runtime, G: Registry, I: Installer> {
    spec: PackageSpec,
    runtime: &'a R,
    registry: &'a G,
    installer: &'a I,
    use_custom_registry: bool,
}

impl<'a, R: Runtime, G: Registry, I: Installer> Package<'a, R, G, I> {
    pub fn new(spec: PackageSpec, runtime: &'a R, registry: &'a G, installer: &'a I) -> Self {
        Self {
            spec,
            runtime,
            registry,
            installer,
            use_custom_registry: false,
        }
    }

    /// Install from the custom registry instead of the default one.
    pub fn with_custom_registry(mut self, use_custom: bool) -> Self {
        self.use_custom_registry = use_custom;
        self
    }

    pub fn spec(&self) -> &PackageSpec {
        &self.spec
    }

    /// Create the store directory and pin `latest` to a concrete version.
    async fn prepare(&mut self) -> Result<String> {
        if let Some(store_dir) = &self.spec.store_dir
            && !self.runtime.exists(store_dir)
        {
            debug!("Creating store directory {:?}", store_dir);
            self.runtime.create_dir_all(store_dir)?;
        }

        match &self.spec.package_version {
            PackageVersion::Exact(version) => Ok(version.clone()),
            PackageVersion::Latest => {
                let version = self.registry.latest_version(&self.spec.package_name).await?;
                debug!("Resolved {}@latest to {}", self.spec.package_name, version);
                self.spec.package_version = PackageVersion::Exact(version.clone());
                Ok(version)
            }
        }
    }

    /// Cache directory of the current version. Requires a store and a resolved version.
    pub fn cache_file_path(&self) -> Result<PathBuf> {
        let Some(store_dir) = &self.spec.store_dir else {
            return Err(ExecError::config(format!(
                "{} has no store directory",
                self.spec.package_name
            )));
        };
        let Some(version) = self.spec.package_version.as_exact() else {
            return Err(ExecError::config(format!(
                "{} has no resolved version yet",
                self.spec.package_name
            )));
        };
        Ok(cache_path(store_dir, &self.spec.package_name, version))
    }

    /// Whether the package is present: its cache directory, or the target path itself.
    #[tracing::instrument(skip(self), fields(name = %self.spec.package_name))]
    pub async fn exists(&mut self) -> Result<bool> {
        if self.spec.store_dir.is_none() {
            return Ok(self.runtime.exists(&self.spec.target_path));
        }

        self.prepare().await?;
        let path = self.cache_file_path()?;
        debug!("Cache path of {} is {:?}", self.spec.package_name, path);
        Ok(self.runtime.exists(&path))
    }

    /// Install the current version.
    #[tracing::instrument(skip(self), fields(name = %self.spec.package_name))]
    pub async fn install(&mut self) -> Result<()> {
        let version = self.prepare().await?;
        info!("Installing {}@{}...", self.spec.package_name, version);
        self.install_version(version).await
    }

    /// Make sure the newest published version is present.
    ///
    /// Only a fresh install switches the package to the newest version; when
    /// it is already cached the current version stays in use. Older cache
    /// directories are left in place. Returns the cache path of the newest
    /// version.
    #[tracing::instrument(skip(self), fields(name = %self.spec.package_name))]
    pub async fn update(&mut self) -> Result<PathBuf> {
        self.prepare().await?;

        let latest = self.registry.latest_version(&self.spec.package_name).await?;
        let latest_path = cache_path(&self.store_dir(), &self.spec.package_name, &latest);

        if self.runtime.exists(&latest_path) {
            debug!(
                "{}@{} is already in the store",
                self.spec.package_name, latest
            );
        } else {
            info!("Updating {} to {}...", self.spec.package_name, latest);
            self.install_version(latest.clone()).await?;
            self.spec.package_version = PackageVersion::Exact(latest);
        }

        Ok(latest_path)
    }

    /// Entry file of the package, `None` when its manifest declares none.
    pub fn entry_file_path(&self) -> Result<Option<PathBuf>> {
        let dir = if self.spec.uses_store() {
            self.cache_file_path()?
        } else {
            self.spec.target_path.clone()
        };
        resolve_entry_file(self.runtime, &dir)
    }

    async fn install_version(&self, version: String) -> Result<()> {
        let registry_url = self.registry.default_registry_url(self.use_custom_registry);
        let request = PackageRequest::new(self.spec.package_name.clone(), version);

        self.installer
            .install_packages(
                &self.spec.target_path,
                &self.store_dir(),
                &registry_url,
                &[request],
            )
            .await
            .map_err(ExecError::into_install)
    }

    /// Store used for installs; a bare target path keeps its own `node_modules`.
    fn store_dir(&self) -> PathBuf {
        self.spec
            .store_dir
            .clone()
            .unwrap_or_else(|| self.spec.target_path.join("node_modules"))
    }
}
