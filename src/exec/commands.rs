//! Command table: which package implements which subcommand.

use anyhow::Result;

use crate::error::ExecError;

/// One registered subcommand and the package version that implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPackage {
    pub command: &'static str,
    pub package_name: &'static str,
    pub package_version: &'static str,
}

pub const COMMANDS: &[CommandPackage] = &[CommandPackage {
    command: "init",
    package_name: "@imooc-cli/init",
    package_version: "1.1.0",
}];

/// Find the package registered for `command`.
pub fn lookup(command: &str) -> Result<&'static CommandPackage> {
    COMMANDS
        .iter()
        .find(|c| c.command == command)
        .ok_or_else(|| ExecError::config(format!("no package is registered for command '{}'", command)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::spec::validate_package_name;

    #[test]
    fn test_lookup_init() {
        let init = lookup("init").unwrap();
        assert_eq!(init.package_name, "@imooc-cli/init");
        assert_eq!(init.package_version, "1.1.0");
    }

    #[test]
    fn test_lookup_unknown_command() {
        let err = lookup("publish").unwrap_err();
        assert!(matches!(
            ExecError::kind_of(&err),
            Some(ExecError::Config(_))
        ));
    }

    #[test]
    fn test_registered_packages_are_valid() {
        for entry in COMMANDS {
            validate_package_name(entry.package_name).unwrap();
            semver::Version::parse(entry.package_version).unwrap();
        }
    }
}
