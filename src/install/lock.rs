//! Advisory per-package install lock.
//!
//! The lock file records its owner. A lock whose owner process has exited,
//! that never got an owner written, or that is older than [`STALE_LOCK_AGE`]
//! is taken over instead of waited on.

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::ExecError;
use crate::runtime::Runtime;

/// How often a waiting process re-checks a held lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default upper bound on waiting for another process's install.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// Age after which a lock is abandoned even if its owner pid is alive again.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(600);

/// Contents of a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LockOwner {
    pub pid: u32,
    /// Seconds since the Unix epoch.
    pub created: u64,
}

impl LockOwner {
    pub(crate) fn current<R: Runtime>(runtime: &R) -> Self {
        Self {
            pid: runtime.process_id(),
            created: unix_now(),
        }
    }

    fn is_abandoned<R: Runtime>(&self, runtime: &R) -> bool {
        if !runtime.is_process_running(self.pid) {
            return true;
        }
        unix_now().saturating_sub(self.created) > STALE_LOCK_AGE.as_secs()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

enum Holder {
    Released,
    Owner(LockOwner),
    Unknown,
}

fn read_holder<R: Runtime>(runtime: &R, path: &Path) -> Holder {
    match runtime.read_to_string(path) {
        Ok(content) => serde_json::from_str(&content)
            .map(Holder::Owner)
            .unwrap_or(Holder::Unknown),
        Err(_) if !runtime.exists(path) => Holder::Released,
        Err(_) => Holder::Unknown,
    }
}

/// Exclusive lock file; released when dropped.
pub struct InstallLock<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> InstallLock<'a, R> {
    /// Wait until the lock file at `path` can be created exclusively.
    pub async fn acquire(runtime: &'a R, path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        let mut announced = false;
        let mut ownerless_since: Option<Instant> = None;

        loop {
            if runtime.create_new(path)? {
                let lock = Self {
                    runtime,
                    path: path.to_path_buf(),
                };
                let owner = LockOwner::current(runtime);
                runtime.write(path, &serde_json::to_vec(&owner)?)?;
                debug!("Acquired install lock {:?} as pid {}", path, owner.pid);
                return Ok(lock);
            }

            match read_holder(runtime, path) {
                Holder::Released => continue,
                Holder::Owner(owner) => {
                    ownerless_since = None;
                    if owner.is_abandoned(runtime) && reclaim(runtime, path, Some(&owner))? {
                        continue;
                    }
                }
                Holder::Unknown => {
                    // The owner writes its record right after creating the file
                    let since = *ownerless_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= LOCK_POLL_INTERVAL && reclaim(runtime, path, None)? {
                        ownerless_since = None;
                        continue;
                    }
                }
            }

            if started.elapsed() >= timeout {
                return Err(ExecError::install(format!(
                    "timed out after {}s waiting for install lock {:?}; remove it if no other install is running",
                    timeout.as_secs(),
                    path
                )));
            }

            if !announced {
                warn!("Waiting for another install to finish ({:?})...", path);
                announced = true;
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }
}

/// Move an abandoned lock aside and delete it. Returns false when another
/// process got to it first.
fn reclaim<R: Runtime>(runtime: &R, path: &Path, judged: Option<&LockOwner>) -> Result<bool> {
    let aside = path.with_extension(format!("stale-{}", runtime.process_id()));
    if runtime.rename(path, &aside).is_err() {
        return Ok(false);
    }

    let moved = match read_holder(runtime, &aside) {
        Holder::Owner(owner) => Some(owner),
        _ => None,
    };
    if moved.as_ref() != judged {
        // A live lock was taken between the check and the move
        runtime.rename(&aside, path)?;
        return Ok(false);
    }

    runtime.remove_file(&aside)?;
    match judged {
        Some(owner) => warn!(
            "Removed abandoned install lock {:?} left by pid {}",
            path, owner.pid
        ),
        None => warn!("Removed install lock {:?} without an owner", path),
    }
    Ok(true)
}

impl<R: Runtime> Drop for InstallLock<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.remove_file(&self.path) {
            warn!("Failed to release install lock {:?}: {}", self.path, e);
        }
    }
}
