//! Unified error types for the removable-mount-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.

use snafu::{ResultExt, Snafu};

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
///
/// Discovery problems are recovered locally (a candidate is skipped, a missing
/// mount table reads as absent), so the variants here cover only the mount
/// orchestrator's resource failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Failed to spawn an external helper command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Failed to read from a helper command's output streams.
    #[snafu(display("failed to capture output of command '{command}'"))]
    OutputCapture {
        command: String,
        source: std::io::Error,
    },

    /// Failed to collect a helper command's exit status.
    #[snafu(display("failed to collect exit status of command '{command}'"))]
    CommandWait {
        command: String,
        source: std::io::Error,
    },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command spawn errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for output capture errors.
    fn capture_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for exit status collection errors.
    fn wait_context(self, command: impl Into<String>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn capture_context(self, command: impl Into<String>) -> Result<T> {
        self.context(OutputCaptureSnafu {
            command: command.into(),
        })
    }

    fn wait_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandWaitSnafu {
            command: command.into(),
        })
    }
}
