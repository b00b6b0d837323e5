//! Error types for the conformance harness
//!
//! Transport failures (launch, broken pipe) propagate straight to the caller
//! and are never retried: a desynchronized interactive session only gets
//! worse when replayed.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while driving a child process
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The executable could not be resolved or spawned
    #[error("Failed to launch {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An operation needed a running child but `start()` was never called
    #[error("Child process not started. Call start() first")]
    NotStarted,

    /// The child's stdin is closed; it exited or crashed
    #[error("Broken pipe writing {command:?}: child process is gone")]
    BrokenPipe {
        command: String,
        #[source]
        source: io::Error,
    },

    /// No response line arrived within the configured budget
    #[error("Timed out after {}ms waiting for response to {command:?}", .timeout.as_millis())]
    ResponseTimeout { command: String, timeout: Duration },

    /// Sandbox filesystem operation failed
    #[error("Sandbox error at {}: {source}", .path.display())]
    Sandbox {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure talking to the child
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HarnessError {
    pub(crate) fn sandbox(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Sandbox {
            path: path.into(),
            source,
        }
    }

    /// Map a failed write to the child's stdin
    pub(crate) fn from_write(command: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::BrokenPipe {
            HarnessError::BrokenPipe {
                command: command.to_string(),
                source,
            }
        } else {
            HarnessError::Io(source)
        }
    }

    /// Whether the error means the child is no longer reachable
    pub fn is_child_gone(&self) -> bool {
        matches!(self, HarnessError::BrokenPipe { .. })
    }
}
