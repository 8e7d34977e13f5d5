use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    error::ExecError,
    exec::{ExecContext, ExecOptions, ProcessSpawner, Spawner},
    http::HttpClient,
    install::{Installer, NpmInstaller},
    registry::{NpmRegistry, Registry},
    runtime::Runtime,
};

/// Directory under the user's home used when no cache root is given.
pub const DEFAULT_HOME_DIR: &str = ".clidev";

/// Runtime used to load entry files when `CLI_NODE` is not set.
pub const DEFAULT_NODE: &str = "node";

/// Values the outer command line hands to the executor.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Developer override of the package directory; empty means none
    pub target_path: Option<String>,
    /// Cache root; defaults to `<home>/<CLI_HOME or .clidev>`
    pub home_path: Option<PathBuf>,
    /// Custom registry base URL
    pub registry: Option<String>,
    /// Prefer the custom registry
    pub use_mirror: bool,
    /// JavaScript runtime; defaults to `node`
    pub node: Option<String>,
    /// Bounded wait on the child process
    pub timeout: Option<Duration>,
}

pub struct Config<R: Runtime, G: Registry, I: Installer, S: Spawner> {
    pub runtime: R,
    pub registry: G,
    pub installer: I,
    pub spawner: S,
    pub context: ExecContext,
    pub options: ExecOptions,
}

impl<R: Runtime + Clone> Config<R, NpmRegistry, NpmInstaller<R>, ProcessSpawner> {
    pub fn new(runtime: R, settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent("clidev-cli")
            .build()
            .context("Failed to build HTTP client")?;
        let http_client = HttpClient::new(client);

        let custom_url = settings.registry.filter(|u| !u.trim().is_empty());
        let use_custom = settings.use_mirror || custom_url.is_some();
        let mut registry = NpmRegistry::new(http_client.clone()).prefer_custom(use_custom);
        if let Some(url) = custom_url {
            debug!("Using custom registry {}", url);
            registry = registry.with_custom_url(url);
        }

        let home_path = match settings.home_path {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => default_home_path(&runtime)?,
        };
        let context = ExecContext::new(settings.target_path, home_path);
        debug!("Execution context: {:?}", context);

        let options = ExecOptions {
            node: settings.node.unwrap_or_else(|| DEFAULT_NODE.to_string()),
            timeout: settings.timeout,
            use_custom_registry: use_custom,
        };

        let installer = NpmInstaller::new(runtime.clone(), http_client);

        Ok(Self {
            runtime,
            registry,
            installer,
            spawner: ProcessSpawner,
            context,
            options,
        })
    }
}

/// `<home>/<CLI_HOME>`, falling back to `<home>/.clidev`.
pub fn default_home_path<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home = runtime
        .home_dir()
        .ok_or_else(|| ExecError::config("could not determine the user home directory"))?;
    let dir = runtime
        .env_var("CLI_HOME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOME_DIR.to_string());
    Ok(home.join(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::test_home;
    use mockito::{Matcher, Server};

    fn runtime_with_home(cli_home: Option<&'static str>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime.expect_home_dir().returning(|| Some(test_home()));
        runtime
            .expect_env_var()
            .with(mockall::predicate::eq("CLI_HOME"))
            .returning(move |_| {
                cli_home
                    .map(str::to_string)
                    .ok_or(std::env::VarError::NotPresent)
            });
        runtime
    }

    #[test]
    fn test_default_home_path() {
        let runtime = runtime_with_home(None);
        assert_eq!(
            default_home_path(&runtime).unwrap(),
            test_home().join(".clidev")
        );

        let runtime = runtime_with_home(Some(".my-cli"));
        assert_eq!(
            default_home_path(&runtime).unwrap(),
            test_home().join(".my-cli")
        );
    }

    #[test]
    fn test_default_home_path_without_home_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_home_dir().returning(|| None);

        let err = default_home_path(&runtime).unwrap_err();
        assert!(matches!(
            ExecError::kind_of(&err),
            Some(ExecError::Config(_))
        ));
    }

    #[test]
    fn test_config_new_defaults() {
        let config = Config::new(RealRuntime, Settings::default()).unwrap();

        assert_eq!(config.context.target_path, None);
        assert_eq!(
            config.context.home_path,
            default_home_path(&RealRuntime).unwrap()
        );
        assert_eq!(config.options.node, DEFAULT_NODE);
        assert_eq!(config.options.timeout, None);
        assert!(!config.options.use_custom_registry);
        assert_eq!(
            config.registry.default_registry_url(false),
            crate::registry::DEFAULT_REGISTRY_URL
        );
    }

    #[test]
    fn test_config_new_with_settings() {
        let settings = Settings {
            target_path: Some("".to_string()),
            home_path: Some(test_home().join("cache")),
            registry: Some("http://localhost:4873/".to_string()),
            node: Some("/usr/local/bin/node".to_string()),
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let config = Config::new(RealRuntime, settings).unwrap();

        // An empty override means none
        assert_eq!(config.context.target_path, None);
        assert_eq!(config.context.home_path, test_home().join("cache"));
        assert_eq!(config.options.node, "/usr/local/bin/node");
        assert!(config.options.use_custom_registry);
        assert!(config.registry.uses_custom());
        assert_eq!(
            config.registry.default_registry_url(true),
            "http://localhost:4873"
        );
    }

    #[tokio::test]
    async fn test_config_client_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("User-Agent", Matcher::Exact("clidev-cli".to_string()))
            .create_async()
            .await;

        let settings = Settings {
            home_path: Some(test_home()),
            ..Default::default()
        };
        let config = Config::new(RealRuntime, settings).unwrap();
        let client = config.registry.http_client().inner();
        let _ = client.get(server.url()).send().await;

        mock.assert_async().await;
    }
}
