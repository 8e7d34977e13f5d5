//! Error kinds surfaced by the dispatch pipeline.
//!
//! Every kind is terminal for the invocation that raised it. They travel
//! inside `anyhow::Error`; use `downcast_ref::<ExecError>()` to classify.

/// Failure kinds of a single command dispatch.
#[derive(Debug)]
pub enum ExecError {
    /// Missing or invalid package descriptor. Raised before any I/O.
    Config(String),
    /// Version lookup against the registry failed.
    Registry(String),
    /// Installing or updating a package failed. The store may hold leftovers.
    Install(String),
    /// The child process could not be created.
    Spawn(String),
}

impl ExecError {
    pub fn config(msg: impl Into<String>) -> anyhow::Error {
        anyhow::Error::from(ExecError::Config(msg.into()))
    }

    pub fn registry(msg: impl Into<String>) -> anyhow::Error {
        anyhow::Error::from(ExecError::Registry(msg.into()))
    }

    pub fn install(msg: impl Into<String>) -> anyhow::Error {
        anyhow::Error::from(ExecError::Install(msg.into()))
    }

    pub fn spawn(msg: impl Into<String>) -> anyhow::Error {
        anyhow::Error::from(ExecError::Spawn(msg.into()))
    }

    /// Re-tag any failure raised while installing as an install failure.
    pub fn into_install(err: anyhow::Error) -> anyhow::Error {
        match ExecError::kind_of(&err) {
            Some(ExecError::Install(_)) => err,
            _ => ExecError::install(format!("{:#}", err)),
        }
    }

    /// Returns the kind of `err` if it (or anything in its chain) is an `ExecError`.
    pub fn kind_of(err: &anyhow::Error) -> Option<&ExecError> {
        err.chain().find_map(|e| e.downcast_ref::<ExecError>())
    }
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            ExecError::Registry(msg) => write!(f, "Registry lookup failed: {}", msg),
            ExecError::Install(msg) => write!(f, "Install failed: {}", msg),
            ExecError::Spawn(msg) => write!(f, "Failed to start command: {}", msg),
        }
    }
}

impl std::error::Error for ExecError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exec_error_display() {
        assert_eq!(
            ExecError::Config("packageName is empty".into()).to_string(),
            "Invalid configuration: packageName is empty"
        );
        assert!(
            ExecError::Spawn("node: not found".into())
                .to_string()
                .contains("node: not found")
        );
    }

    #[test]
    fn test_kind_of_survives_context() {
        let err: anyhow::Result<()> = Err(ExecError::registry("timeout"));
        let err = err.context("while resolving latest").unwrap_err();

        assert!(matches!(
            ExecError::kind_of(&err),
            Some(ExecError::Registry(_))
        ));
    }

    #[test]
    fn test_into_install_wraps_other_kinds() {
        let err = ExecError::into_install(ExecError::registry("404 for pkg"));
        match ExecError::kind_of(&err) {
            Some(ExecError::Install(msg)) => assert!(msg.contains("404 for pkg")),
            other => panic!("unexpected kind {:?}", other),
        }

        let err = ExecError::into_install(anyhow::anyhow!("disk full"));
        assert!(matches!(
            ExecError::kind_of(&err),
            Some(ExecError::Install(_))
        ));
    }

    #[test]
    fn test_into_install_keeps_install_errors() {
        let err = ExecError::into_install(ExecError::install("lock timeout"));
        assert_eq!(err.to_string(), "Install failed: lock timeout");
    }

    #[test]
    fn test_kind_of_plain_error_is_none() {
        let err = anyhow::anyhow!("something else");
        assert!(ExecError::kind_of(&err).is_none());
    }
}
