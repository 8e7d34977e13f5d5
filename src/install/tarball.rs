//! Package tarball extraction and integrity checking.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use log::{debug, warn};
use sha2::{Digest, Sha512};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use crate::registry::Dist;
use crate::runtime::Runtime;

/// Unpack a gzipped package tarball into `dest`.
///
/// The single top-level directory every registry tarball carries
/// (usually `package/`) is stripped. Returns the number of files written.
#[tracing::instrument(skip(reader))]
pub fn unpack_package<Rd: Read>(reader: Rd, dest: &Path) -> Result<usize> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut files = 0;

    for entry in archive.entries().context("Failed to read tarball entries")? {
        let mut entry = entry.context("Failed to read tarball entry")?;
        let raw_path = entry.path().context("Invalid path in tarball")?.into_owned();

        let Some(relative) = strip_top_level(&raw_path)? else {
            continue;
        };
        let out_path = dest.join(&relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                std::fs::create_dir_all(&out_path)
                    .with_context(|| format!("Failed to create {:?}", out_path))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {:?}", parent))?;
                }
                entry
                    .unpack(&out_path)
                    .with_context(|| format!("Failed to extract {:?}", relative))?;
                files += 1;
            }
            other => {
                warn!("Skipping unsupported tarball entry {:?} ({:?})", raw_path, other);
            }
        }
    }

    debug!("Extracted {} file(s) to {:?}", files, dest);
    Ok(files)
}

/// Drop the first path component and reject anything escaping the destination.
fn strip_top_level(path: &Path) -> Result<Option<PathBuf>> {
    let mut stripped = PathBuf::new();
    for component in path.components().skip(1) {
        match component {
            Component::Normal(part) => stripped.push(part),
            Component::CurDir => {}
            _ => bail!("Refusing to extract unsafe path {:?}", path),
        }
    }
    if path.is_absolute() {
        bail!("Refusing to extract absolute path {:?}", path);
    }
    Ok((!stripped.as_os_str().is_empty()).then_some(stripped))
}

/// Verify a downloaded tarball against the registry's `sha512` integrity string.
///
/// Tarballs that only advertise weaker digests are accepted with a warning.
#[tracing::instrument(skip(runtime, dist))]
pub fn verify_integrity<R: Runtime>(runtime: &R, path: &Path, dist: &Dist) -> Result<()> {
    let Some(expected) = dist
        .integrity
        .as_deref()
        .into_iter()
        .flat_map(str::split_whitespace)
        .find_map(|item| item.strip_prefix("sha512-"))
    else {
        warn!("{}", unverified_warning(dist));
        return Ok(());
    };

    let mut reader = runtime.open(path)?;
    let mut hasher = Sha512::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let actual = STANDARD.encode(hasher.finalize());
    if actual != expected {
        bail!(
            "Integrity check failed for {}: expected sha512-{}, got sha512-{}",
            dist.tarball,
            expected,
            actual
        );
    }
    Ok(())
}

fn unverified_warning(dist: &Dist) -> String {
    match (&dist.integrity, &dist.shasum) {
        (Some(integrity), _) => format!(
            "Not verifying {}: unsupported integrity {:?}, only sha512 is checked",
            dist.tarball, integrity
        ),
        (None, Some(shasum)) => format!(
            "Not verifying {}: the registry only publishes sha1 shasum {}",
            dist.tarball, shasum
        ),
        (None, None) => format!(
            "Not verifying {}: the registry publishes no checksum",
            dist.tarball
        ),
    }
}
