//! Installer backed by an npm-compatible registry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{
    DEFAULT_LOCK_TIMEOUT, InstallLock, Installer, LOCKS_DIR, PackageRequest, StagingDir,
    link_package, unpack_package, verify_integrity,
};
use crate::error::ExecError;
use crate::http::HttpClient;
use crate::package::cache_path::{cache_path, flat_key};
use crate::registry::{Dist, PackageInfo, VersionInfo, fetch_package_info};
use crate::runtime::Runtime;

/// A concrete package version selected for installation.
#[derive(Debug, Clone)]
struct PlannedPackage {
    name: String,
    version: String,
    dist: Dist,
    /// `(name, version)` of each direct dependency
    dependencies: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct InstallPlan {
    roots: Vec<(String, String)>,
    /// Breadth-first order, requested packages first
    packages: Vec<PlannedPackage>,
}

/// Installs packages into the version-addressed store.
///
/// Every package version is fetched once, unpacked in a private staging
/// directory and moved into place with a single rename while holding a
/// per-version lock, so concurrent installs never observe a half-written
/// cache directory.
pub struct NpmInstaller<R: Runtime> {
    runtime: R,
    http: HttpClient,
    lock_timeout: Duration,
}

impl<R: Runtime> NpmInstaller<R> {
    pub fn new(runtime: R, http: HttpClient) -> Self {
        Self {
            runtime,
            http,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Upper bound on waiting for another process installing the same version.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    async fn install_all(
        &self,
        root: &Path,
        store_dir: &Path,
        registry_url: &str,
        pkgs: &[PackageRequest],
    ) -> Result<()> {
        self.runtime.create_dir_all(store_dir)?;

        let plan = self.plan(registry_url, pkgs).await?;
        debug!(
            "Install plan: {} package(s) for {} request(s)",
            plan.packages.len(),
            plan.roots.len()
        );

        // Deepest dependencies first, so a cache entry only appears once its links resolve
        for pkg in plan.packages.iter().rev() {
            self.install_one(store_dir, pkg).await?;
        }

        let node_modules = root.join("node_modules");
        for (name, version) in &plan.roots {
            self.link_if_free(&cache_path(store_dir, name, version), &node_modules.join(name))?;
        }
        Ok(())
    }

    /// Resolve every request and its transitive dependencies to exact versions.
    async fn plan(&self, registry_url: &str, pkgs: &[PackageRequest]) -> Result<InstallPlan> {
        let mut documents: HashMap<String, PackageInfo> = HashMap::new();
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut queue: VecDeque<VersionInfo> = VecDeque::new();
        let mut plan = InstallPlan::default();

        for req in pkgs {
            let selected = self
                .select(&mut documents, registry_url, &req.name, &req.version)
                .await?;
            plan.roots.push((req.name.clone(), selected.version.clone()));
            queue.push_back(selected);
        }

        while let Some(info) = queue.pop_front() {
            if !visited.insert((info.name.clone(), info.version.clone())) {
                continue;
            }

            let mut dependencies = Vec::with_capacity(info.dependencies.len());
            for (dep, range) in &info.dependencies {
                let selected = self.select(&mut documents, registry_url, dep, range).await?;
                dependencies.push((dep.clone(), selected.version.clone()));
                queue.push_back(selected);
            }

            plan.packages.push(PlannedPackage {
                name: info.name,
                version: info.version,
                dist: info.dist,
                dependencies,
            });
        }

        Ok(plan)
    }

    async fn select(
        &self,
        documents: &mut HashMap<String, PackageInfo>,
        registry_url: &str,
        name: &str,
        range: &str,
    ) -> Result<VersionInfo> {
        if !documents.contains_key(name) {
            let info = fetch_package_info(&self.http, registry_url, name).await?;
            documents.insert(name.to_string(), info);
        }

        let selected = documents
            .get(name)
            .and_then(|info| info.resolve(range))
            .ok_or_else(|| {
                ExecError::install(format!("no version of {} matches '{}'", name, range))
            })?;

        // Registry documents may name the package differently (e.g. case); key the store by the request
        let mut selected = selected.clone();
        selected.name = name.to_string();
        debug!("Selected {}@{} for '{}'", name, selected.version, range);
        Ok(selected)
    }

    #[tracing::instrument(skip(self, pkg), fields(name = %pkg.name, version = %pkg.version))]
    async fn install_one(&self, store_dir: &Path, pkg: &PlannedPackage) -> Result<PathBuf> {
        let target = cache_path(store_dir, &pkg.name, &pkg.version);
        if self.runtime.exists(&target) {
            debug!("{}@{} already in store", pkg.name, pkg.version);
            return Ok(target);
        }

        let key = flat_key(&pkg.name, &pkg.version);
        let locks_dir = store_dir.join(LOCKS_DIR);
        self.runtime.create_dir_all(&locks_dir)?;
        let _lock = InstallLock::acquire(
            &self.runtime,
            &locks_dir.join(format!("{}.lock", key)),
            self.lock_timeout,
        )
        .await?;

        if self.runtime.exists(&target) {
            debug!("{}@{} was installed by another process", pkg.name, pkg.version);
            return Ok(target);
        }

        info!("Installing {}@{}...", pkg.name, pkg.version);
        let staging = StagingDir::create(
            &self.runtime,
            store_dir.join(format!(".staging{}-{}", key, self.runtime.process_id())),
        )?;

        let tarball = staging.path().join("package.tgz");
        self.http
            .download_file(&pkg.dist.tarball, || self.runtime.create_file(&tarball))
            .await
            .with_context(|| format!("Failed to download {}@{}", pkg.name, pkg.version))?;
        verify_integrity(&self.runtime, &tarball, &pkg.dist)?;

        let package_dir = staging.path().join("package");
        self.runtime.create_dir_all(&package_dir)?;
        unpack_package(self.runtime.open(&tarball)?, &package_dir)
            .with_context(|| format!("Failed to unpack {}@{}", pkg.name, pkg.version))?;

        let node_modules = package_dir.join("node_modules");
        for (dep, version) in &pkg.dependencies {
            self.link_if_free(&cache_path(store_dir, dep, version), &node_modules.join(dep))?;
        }

        if let Some(parent) = target.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .rename(&package_dir, &target)
            .with_context(|| format!("Failed to move {}@{} into the store", pkg.name, pkg.version))?;

        debug!("Installed {}@{} at {:?}", pkg.name, pkg.version, target);
        Ok(target)
    }

    /// Link unless a real file or directory already occupies `link`.
    fn link_if_free(&self, target: &Path, link: &Path) -> Result<()> {
        if self.runtime.exists(link) && !self.runtime.is_symlink(link) {
            warn!("Keeping existing {:?}, not linking {:?}", link, target);
            return Ok(());
        }
        link_package(&self.runtime, target, link)
    }
}

#[async_trait]
impl<R: Runtime> Installer for NpmInstaller<R> {
    #[tracing::instrument(skip(self, pkgs))]
    async fn install_packages(
        &self,
        root: &Path,
        store_dir: &Path,
        registry_url: &str,
        pkgs: &[PackageRequest],
    ) -> Result<()> {
        self.install_all(root, store_dir, registry_url, pkgs)
            .await
            .map_err(ExecError::into_install)
    }
}
