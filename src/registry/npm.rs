use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use super::{DEFAULT_REGISTRY_URL, MIRROR_REGISTRY_URL, PackageInfo, Registry};
use crate::error::ExecError;
use crate::http::HttpClient;

/// npm-compatible registry client.
pub struct NpmRegistry {
    http: HttpClient,
    default_url: String,
    custom_url: String,
    use_custom: bool,
}

impl NpmRegistry {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            default_url: DEFAULT_REGISTRY_URL.to_string(),
            custom_url: MIRROR_REGISTRY_URL.to_string(),
            use_custom: false,
        }
    }

    /// Override the URL used as the custom registry.
    pub fn with_custom_url(mut self, url: impl Into<String>) -> Self {
        self.custom_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Query the custom registry instead of the default one.
    pub fn prefer_custom(mut self, use_custom: bool) -> Self {
        self.use_custom = use_custom;
        self
    }

    pub fn uses_custom(&self) -> bool {
        self.use_custom
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.http
    }

    fn base_url(&self) -> String {
        self.default_registry_url(self.use_custom)
    }
}

/// URL of a package document. Scoped names keep their `@` and escape the `/`.
pub fn package_url(base: &str, name: &str) -> String {
    let encoded = urlencoding::encode(name).replace("%40", "@");
    format!("{}/{}", base.trim_end_matches('/'), encoded)
}

/// Fetch a package document from the registry at `base`.
#[tracing::instrument(skip(http))]
pub async fn fetch_package_info(http: &HttpClient, base: &str, name: &str) -> Result<PackageInfo> {
    let url = package_url(base, name);
    http.get_json::<PackageInfo>(&url)
        .await
        .map(PackageInfo::normalized)
        .map_err(|e| ExecError::registry(format!("{}: {:#}", name, e)))
}

#[async_trait]
impl Registry for NpmRegistry {
    fn default_registry_url(&self, use_custom: bool) -> String {
        if use_custom {
            self.custom_url.clone()
        } else {
            self.default_url.clone()
        }
    }

    async fn package_info(&self, name: &str) -> Result<PackageInfo> {
        fetch_package_info(&self.http, &self.base_url(), name).await
    }

    async fn versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.package_info(name).await?.version_list())
    }

    async fn latest_version(&self, name: &str) -> Result<String> {
        let info = self.package_info(name).await?;
        let latest = info
            .latest_version()
            .ok_or_else(|| ExecError::registry(format!("{} has no published versions", name)))?;
        debug!("Latest version of {} is {}", name, latest);
        Ok(latest)
    }
}
