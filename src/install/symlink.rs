//! Package links into `node_modules`.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::Path;

use crate::runtime::Runtime;

/// Point `link` at `target`, replacing a symlink that points elsewhere.
///
/// A real file or directory at `link` is never replaced.
#[tracing::instrument(skip(runtime))]
pub fn link_package<R: Runtime>(runtime: &R, target: &Path, link: &Path) -> Result<()> {
    if runtime.is_symlink(link) {
        match runtime.read_link(link) {
            Ok(existing) if existing == target => {
                debug!("{:?} already points to {:?}", link, target);
                return Ok(());
            }
            Ok(existing) => {
                debug!("Relinking {:?} from {:?} to {:?}", link, existing, target);
            }
            Err(_) => {
                debug!("{:?} is unreadable, recreating...", link);
            }
        }
        runtime.remove_symlink(link)?;
    } else if runtime.exists(link) {
        bail!("{:?} already exists and is not a symlink", link);
    }

    if let Some(parent) = link.parent()
        && !runtime.exists(parent)
    {
        runtime.create_dir_all(parent)?;
    }

    runtime
        .symlink(target, link)
        .with_context(|| format!("Failed to link {:?} -> {:?}", link, target))
}
