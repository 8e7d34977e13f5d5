//! Package layer.
//!
//! A package is addressed by name and version. This module derives its
//! cache location, validates descriptors, drives install and update through
//! the store, and resolves the entry file a package declares.

pub mod cache_path;
pub mod entry;
pub mod spec;
pub mod store;

pub use cache_path::cache_path;
pub use entry::{Manifest, resolve_entry_file};
pub use spec::{LATEST, PackageOptions, PackageSpec, PackageVersion};
pub use store::Package;
