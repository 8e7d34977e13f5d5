//! Package descriptor.

use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ExecError;

/// Literal that defers version selection to the registry.
pub const LATEST: &str = "latest";

/// Longest package name the npm registry accepts.
const MAX_NAME_LENGTH: usize = 214;

/// Requested version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageVersion {
    /// Resolved to a concrete version on first use
    Latest,
    /// A concrete semantic version, e.g. "1.1.0"
    Exact(String),
}

impl PackageVersion {
    pub fn is_latest(&self) -> bool {
        matches!(self, PackageVersion::Latest)
    }

    /// The concrete version, if already resolved.
    pub fn as_exact(&self) -> Option<&str> {
        match self {
            PackageVersion::Exact(v) => Some(v),
            PackageVersion::Latest => None,
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageVersion::Latest => write!(f, "{}", LATEST),
            PackageVersion::Exact(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for PackageVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == LATEST {
            return Ok(PackageVersion::Latest);
        }
        let normalized = s.strip_prefix('v').unwrap_or(s);
        semver::Version::parse(normalized).map_err(|e| {
            ExecError::config(format!(
                "packageVersion must be a semantic version or '{}', got '{}': {}",
                LATEST, s, e
            ))
        })?;
        Ok(PackageVersion::Exact(normalized.to_string()))
    }
}

/// Raw construction arguments, as handed over by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOptions {
    /// Directory to install into, or the developer override directory
    #[serde(default)]
    pub target_path: String,
    /// Shared cache root; empty when `target_path` is used directly
    #[serde(default)]
    pub store_dir: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub package_version: String,
}

/// Validated descriptor of one package-resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub target_path: PathBuf,
    pub store_dir: Option<PathBuf>,
    pub package_name: String,
    pub package_version: PackageVersion,
}

impl PackageSpec {
    pub fn new(options: PackageOptions) -> Result<Self> {
        validate_package_name(&options.package_name)?;

        if options.target_path.is_empty() && options.store_dir.is_empty() {
            return Err(ExecError::config(
                "either targetPath or storeDir must be provided",
            ));
        }

        if options.package_version.trim().is_empty() {
            return Err(ExecError::config("packageVersion must not be empty"));
        }
        let package_version = options.package_version.parse()?;

        Ok(Self {
            target_path: PathBuf::from(options.target_path),
            store_dir: (!options.store_dir.is_empty()).then(|| PathBuf::from(options.store_dir)),
            package_name: options.package_name,
            package_version,
        })
    }

    /// Build from an untyped JSON value; anything but an object is rejected.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ExecError::config("package options must be an object"));
        }
        let options: PackageOptions = serde_json::from_value(value.clone())
            .map_err(|e| ExecError::config(format!("invalid package options: {}", e)))?;
        Self::new(options)
    }

    /// True when installs go through the shared store.
    pub fn uses_store(&self) -> bool {
        self.store_dir.is_some()
    }
}

/// Check a name against the npm naming rules that matter for the store layout.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ExecError::config("packageName must not be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ExecError::config(format!(
            "packageName is longer than {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if name.starts_with('.') || name.starts_with('_') {
        return Err(ExecError::config(format!(
            "packageName '{}' must not start with '.' or '_'",
            name
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '\\') {
        return Err(ExecError::config(format!(
            "packageName '{}' contains invalid characters",
            name
        )));
    }

    let scoped = name.starts_with('@');
    let slashes = name.matches('/').count();
    let valid_shape = if scoped {
        slashes == 1 && name.split('/').all(|part| !part.is_empty() && part != "@")
    } else {
        slashes == 0
    };
    if !valid_shape || name.split('/').any(|part| part == "." || part == "..") {
        return Err(ExecError::config(format!(
            "packageName '{}' is not a valid package name",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(name: &str, version: &str) -> PackageOptions {
        PackageOptions {
            target_path: "/home/user/dependencies".to_string(),
            store_dir: "/home/user/dependencies/node_modules".to_string(),
            package_name: name.to_string(),
            package_version: version.to_string(),
        }
    }

    fn is_config_error(err: &anyhow::Error) -> bool {
        matches!(ExecError::kind_of(err), Some(ExecError::Config(_)))
    }

    #[test]
    fn test_new_valid_spec() {
        let spec = PackageSpec::new(options("@imooc-cli/init", "1.1.0")).unwrap();
        assert_eq!(spec.package_name, "@imooc-cli/init");
        assert_eq!(
            spec.package_version,
            PackageVersion::Exact("1.1.0".to_string())
        );
        assert!(spec.uses_store());
    }

    #[test]
    fn test_new_latest_version() {
        let spec = PackageSpec::new(options("left-pad", "latest")).unwrap();
        assert!(spec.package_version.is_latest());
        assert_eq!(spec.package_version.as_exact(), None);
        assert_eq!(spec.package_version.to_string(), "latest");
    }

    #[test]
    fn test_new_without_store_uses_target_path() {
        let spec = PackageSpec::new(PackageOptions {
            target_path: "/tmp/dev-init".to_string(),
            package_name: "@imooc-cli/init".to_string(),
            package_version: "1.1.0".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(!spec.uses_store());
        assert_eq!(spec.target_path, PathBuf::from("/tmp/dev-init"));
    }

    #[test]
    fn test_new_empty_name_is_config_error() {
        let err = PackageSpec::new(options("", "1.0.0")).unwrap_err();
        assert!(is_config_error(&err));
    }

    #[test]
    fn test_new_empty_or_invalid_version_is_config_error() {
        assert!(is_config_error(
            &PackageSpec::new(options("pkg", "")).unwrap_err()
        ));
        assert!(is_config_error(
            &PackageSpec::new(options("pkg", "not-a-version")).unwrap_err()
        ));
    }

    #[test]
    fn test_new_without_any_path_is_config_error() {
        let err = PackageSpec::new(PackageOptions {
            package_name: "pkg".to_string(),
            package_version: "1.0.0".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(is_config_error(&err));
    }

    #[test]
    fn test_from_value_non_object_is_config_error() {
        for value in [json!(null), json!("pkg"), json!(42), json!(["pkg"])] {
            let err = PackageSpec::from_value(&value).unwrap_err();
            assert!(is_config_error(&err), "{:?} should be rejected", value);
        }
    }

    #[test]
    fn test_from_value_object() {
        let spec = PackageSpec::from_value(&json!({
            "targetPath": "/tmp/dev-init",
            "packageName": "@imooc-cli/init",
            "packageVersion": "1.1.0"
        }))
        .unwrap();
        assert_eq!(spec.package_name, "@imooc-cli/init");
        assert_eq!(spec.store_dir, None);
    }

    #[test]
    fn test_from_value_missing_name_is_config_error() {
        let err = PackageSpec::from_value(&json!({"targetPath": "/tmp"})).unwrap_err();
        assert!(is_config_error(&err));
    }

    #[test]
    fn test_version_v_prefix_is_stripped() {
        let version: PackageVersion = "v2.3.4".parse().unwrap();
        assert_eq!(version, PackageVersion::Exact("2.3.4".to_string()));
    }

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("left-pad").is_ok());
        assert!(validate_package_name("@imooc-cli/init").is_ok());

        assert!(validate_package_name("a/b").is_err());
        assert!(validate_package_name("@scope/a/b").is_err());
        assert!(validate_package_name("@scope").is_err());
        assert!(validate_package_name("@/pkg").is_err());
        assert!(validate_package_name("@scope/..").is_err());
        assert!(validate_package_name(".hidden").is_err());
        assert!(validate_package_name("_private").is_err());
        assert!(validate_package_name("has space").is_err());
        assert!(validate_package_name(&"x".repeat(215)).is_err());
    }
}
