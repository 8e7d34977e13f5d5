//! Child process primitive.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::payload::PAYLOAD_ENV;
use crate::error::ExecError;

/// Script evaluated by the JavaScript runtime. It loads the entry file named
/// by the first script argument and calls its export with the payload from
/// the environment. It never changes with the input.
pub const BOOTSTRAP: &str = "const entry = process.argv[1];\
const args = JSON.parse(process.env.CLI_EXEC_ARGS || '[]');\
require(entry).call(null, args);";

/// Exit code reported when the child is killed after the configured timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Everything needed to start one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl SpawnRequest {
    /// Run `entry` under the JavaScript runtime `node` with `payload` in the environment.
    pub fn node(node: &str, entry: &Path, payload: String, cwd: PathBuf) -> Self {
        Self {
            program: node.to_string(),
            args: vec![
                "-e".to_string(),
                BOOTSTRAP.to_string(),
                entry.to_string_lossy().into_owned(),
            ],
            cwd,
            env: vec![(PAYLOAD_ENV.to_string(), payload)],
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Spawner: Send + Sync {
    /// Start the child with inherited stdio and wait for it. Returns its exit code.
    async fn spawn_and_wait(&self, request: &SpawnRequest) -> Result<i32>;
}

/// Spawns real operating-system processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

#[async_trait]
impl Spawner for ProcessSpawner {
    #[tracing::instrument(skip(self, request), fields(program = %request.program))]
    async fn spawn_and_wait(&self, request: &SpawnRequest) -> Result<i32> {
        debug!(
            "Spawning {} {:?} in {:?}",
            request.program, request.args, request.cwd
        );

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.cwd)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::spawn(format!("{}: {}", request.program, e)))?;

        let status = match request.timeout {
            None => child.wait().await.context("Failed to wait for child process")?,
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status.context("Failed to wait for child process")?,
                    Err(_) => {
                        warn!(
                            "{} did not finish within {}s, killing it",
                            request.program,
                            limit.as_secs_f64()
                        );
                        child.kill().await.context("Failed to kill child process")?;
                        return Ok(TIMEOUT_EXIT_CODE);
                    }
                }
            }
        };

        let code = exit_code(status);
        debug!("{} exited with {}", request.program, code);
        Ok(code)
    }
}

/// Exit code to pass through; a signal-terminated child maps to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
