//! Registry resolver.
//!
//! Maps a registry preference to a base URL and answers version questions
//! about a named package.

mod npm;
mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use npm::{NpmRegistry, fetch_package_info, package_url};
pub use types::{Dist, PackageInfo, VersionInfo};

/// The public npm registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Registry used when the custom registry is preferred and none was configured.
pub const MIRROR_REGISTRY_URL: &str = "https://registry.npmmirror.com";

/// Version-metadata source for packages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Base URL of the default registry, or of the custom one when `use_custom` is set.
    fn default_registry_url(&self, use_custom: bool) -> String;

    /// Fetch the full registry document of a package.
    async fn package_info(&self, name: &str) -> Result<PackageInfo>;

    /// All published versions of a package.
    async fn versions(&self, name: &str) -> Result<Vec<String>>;

    /// The highest published version of a package.
    async fn latest_version(&self, name: &str) -> Result<String>;
}
