//! Command executor.
//!
//! Resolves a subcommand to its package, makes sure the package is present,
//! and runs its entry file in a child process with the invocation's
//! arguments. The child's exit code becomes the result.

mod commands;
mod payload;
mod spawn;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;

pub use commands::{COMMANDS, CommandPackage, lookup};
pub use payload::{CommandInvocation, PAYLOAD_ENV};
pub use spawn::{BOOTSTRAP, ProcessSpawner, SpawnRequest, Spawner, TIMEOUT_EXIT_CODE, exit_code};

#[cfg(test)]
pub use spawn::MockSpawner;

use crate::config::{Config, Settings};
use crate::error::ExecError;
use crate::install::Installer;
use crate::package::{Package, PackageOptions, PackageSpec};
use crate::registry::Registry;
use crate::runtime::Runtime;

/// Directory under the cache root holding managed installs.
pub const DEPENDENCIES_DIR: &str = "dependencies";

/// Ambient locations supplied by the outer layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    /// Developer override: run the package found here, never install into it
    pub target_path: Option<PathBuf>,
    /// Cache root
    pub home_path: PathBuf,
}

impl ExecContext {
    /// An empty `target_path` means no override.
    pub fn new(target_path: Option<String>, home_path: PathBuf) -> Self {
        Self {
            target_path: target_path
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            home_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// JavaScript runtime that loads the entry file
    pub node: String,
    pub timeout: Option<Duration>,
    pub use_custom_registry: bool,
}

/// Build the real collaborators and run `invocation`.
#[tracing::instrument(skip(runtime, settings))]
pub async fn exec<R: Runtime + Clone>(
    runtime: R,
    settings: Settings,
    invocation: CommandInvocation,
) -> Result<i32> {
    let config = Config::new(runtime, settings)?;
    run(&invocation, &config).await
}

/// Run one invocation against the given collaborators. Returns the exit code to report.
#[tracing::instrument(skip(invocation, config), fields(command = %invocation.name))]
pub async fn run<R: Runtime, G: Registry, I: Installer, S: Spawner>(
    invocation: &CommandInvocation,
    config: &Config<R, G, I, S>,
) -> Result<i32> {
    let command = lookup(&invocation.name)?;
    let context = &config.context;
    debug!("targetPath: {:?}", context.target_path);
    debug!("homePath: {:?}", context.home_path);

    let package = match &context.target_path {
        None => {
            if context.home_path.as_os_str().is_empty() {
                return Err(ExecError::config("homePath must not be empty"));
            }
            let target_path = context.home_path.join(DEPENDENCIES_DIR);
            let store_dir = target_path.join("node_modules");
            debug!("storeDir: {:?}", store_dir);

            let spec = PackageSpec::new(PackageOptions {
                target_path: target_path.to_string_lossy().into_owned(),
                store_dir: store_dir.to_string_lossy().into_owned(),
                package_name: command.package_name.to_string(),
                package_version: command.package_version.to_string(),
            })?;
            let mut package =
                Package::new(spec, &config.runtime, &config.registry, &config.installer)
                    .with_custom_registry(config.options.use_custom_registry);

            if package.exists().await? {
                package.update().await?;
            } else {
                package.install().await?;
            }
            package
        }
        Some(target_path) => {
            let spec = PackageSpec::new(PackageOptions {
                target_path: target_path.to_string_lossy().into_owned(),
                package_name: command.package_name.to_string(),
                package_version: command.package_version.to_string(),
                ..Default::default()
            })?;
            Package::new(spec, &config.runtime, &config.registry, &config.installer)
        }
    };

    let Some(entry) = package.entry_file_path()? else {
        warn!(
            "{} declares no entry file, nothing to run",
            command.package_name
        );
        return Ok(0);
    };
    debug!("Entry file: {:?}", entry);

    let payload = serde_json::to_string(&invocation.payload())
        .context("Failed to serialize command arguments")?;
    let request = SpawnRequest::node(
        &config.options.node,
        &entry,
        payload,
        config.runtime.current_dir()?,
    )
    .with_timeout(config.options.timeout);

    info!(
        "Running {}@{}",
        command.package_name,
        package.spec().package_version
    );
    let code = config.spawner.spawn_and_wait(&request).await?;
    debug!("Command finished with exit code {}", code);
    Ok(code)
}
