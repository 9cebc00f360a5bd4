//! Domain-level error taxonomy for the TCR engine.
//!
//! Build, test and git failures are routine inside a cycle: they are
//! absorbed into a [`Status`](crate::domain::Status) and never abort the
//! role loop. Configuration and unexpected errors are fatal to startup.

use crate::domain::status::Status;

/// TCR engine errors.
#[derive(Debug, thiserror::Error)]
pub enum TcrError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("build failed: {0}")]
    Build(String),

    #[error("tests failed: {0}")]
    Test(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("filesystem watcher error: {0}")]
    Watcher(String),

    #[error("a role is already running: {0}")]
    RoleAlreadyActive(String),

    #[error("no role is currently running")]
    NoActiveRole,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl TcrError {
    /// Map an error to the outcome status it represents at the process
    /// boundary.
    pub fn status(&self) -> Status {
        match self {
            TcrError::Configuration(_) => Status::ConfigError,
            TcrError::Build(_) => Status::BuildFailed,
            TcrError::Test(_) => Status::TestFailed,
            TcrError::Git(_) => Status::GitError,
            TcrError::Watcher(_)
            | TcrError::RoleAlreadyActive(_)
            | TcrError::NoActiveRole
            | TcrError::Io(_)
            | TcrError::Unexpected(_) => Status::OtherError,
        }
    }
}

/// Result type for TCR engine operations.
pub type Result<T> = std::result::Result<T, TcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TcrError::Configuration("no supported language found".to_string());
        assert!(err.to_string().contains("configuration error"));

        let err = TcrError::Git("push rejected".to_string());
        assert!(err.to_string().contains("git error"));
        assert!(err.to_string().contains("push rejected"));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            TcrError::Configuration("x".into()).status(),
            Status::ConfigError
        );
        assert_eq!(TcrError::Build("x".into()).status(), Status::BuildFailed);
        assert_eq!(TcrError::Test("x".into()).status(), Status::TestFailed);
        assert_eq!(TcrError::Git("x".into()).status(), Status::GitError);
        assert_eq!(TcrError::NoActiveRole.status(), Status::OtherError);
    }
}
