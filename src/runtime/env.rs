//! Environment and system information operations.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn current_dir_impl(&self) -> Result<PathBuf> {
        env::current_dir().context("Failed to read current working directory")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_process_running_impl(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            let Ok(raw) = i32::try_from(pid) else {
                return false;
            };
            // Signal 0 only checks existence; EPERM still means the process is there
            !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
        }
        #[cfg(not(unix))]
        {
            let _ = pid;
            true
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_real_runtime_env_and_dirs() {
        let runtime = RealRuntime;

        // PATH should exist on all systems
        assert!(runtime.env_var("PATH").is_ok());
        assert!(runtime.env_var("CLIDEV_SURELY_UNSET_VARIABLE").is_err());

        let home = runtime.home_dir();
        assert!(home.is_some() || cfg!(target_os = "linux")); // CI might not have home

        let cwd = runtime.current_dir().unwrap();
        assert!(cwd.is_absolute());
    }

    #[test]
    fn test_current_process_is_running() {
        let runtime = RealRuntime;
        assert!(runtime.is_process_running(runtime.process_id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_exited_process_is_not_running() {
        let runtime = RealRuntime;
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(!runtime.is_process_running(pid));
    }
}
