//! Error handling module for lempkit
//!
//! Provides centralized error types using thiserror. Step-level failures carry
//! enough context (program, exit code, stderr) for the executor to decide how a
//! failure is reported; everything converges on `LempError` at the top level.

use std::path::PathBuf;

use thiserror::Error;

use crate::install_state::InstallTransitionError;
use crate::lock::LockError;
use crate::probe::ProbeError;
use crate::wizard::WizardError;

/// Main error type for lempkit
#[derive(Error, Debug)]
pub enum LempError {
    /// IO errors (file operations, terminal, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid command-line usage or environment override
    #[error("Usage error: {0}")]
    Usage(String),

    /// Precondition failed before any mutation (root, OS, binaries)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Another run holds the run lock
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Configuration wizard could not complete
    #[error(transparent)]
    Wizard(#[from] WizardError),

    /// A critical provisioning step failed
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: StepError,
    },

    /// A signal stopped the run; cleanup has run or is running
    #[error("Interrupted by {signal}")]
    Interrupted { signal: &'static str },

    /// Install state machine transition errors
    #[error("Install transition error: {0}")]
    InstallTransition(#[from] InstallTransitionError),
}

/// Result type alias for lempkit operations
pub type Result<T> = std::result::Result<T, LempError>;

impl LempError {
    /// Create a usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

/// An external command that ran and did not succeed, or could not be spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{context} failed (exit code {code}): {stderr}")]
    Failed {
        context: String,
        code: i32,
        stderr: String,
    },
}

impl CommandError {
    /// Exit code of the failed command (-1 when it never ran or was signalled)
    pub fn code(&self) -> i32 {
        match self {
            Self::Spawn { .. } => -1,
            Self::Failed { code, .. } => *code,
        }
    }
}

/// Why a provisioning step did not complete.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("cannot write {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// Create a free-form step error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Wrap an IO error with the path it happened on
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LempError::usage("unknown flag --foo");
        assert_eq!(err.to_string(), "Usage error: unknown flag --foo");

        let err = LempError::precondition("must run as root");
        assert_eq!(err.to_string(), "Precondition failed: must run as root");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LempError = io_err.into();
        assert!(matches!(err, LempError::Io(_)));
    }

    #[test]
    fn test_step_error_wraps_command_failure() {
        let cmd = CommandError::Failed {
            context: "apt-get install nginx".into(),
            code: 100,
            stderr: "E: Unable to locate package".into(),
        };
        assert_eq!(cmd.code(), 100);

        let err = LempError::Step {
            step: "web-server",
            source: cmd.into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("web-server"));
        assert!(msg.contains("exit code 100"));
    }
}
