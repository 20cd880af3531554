// ABOUTME: Error types for command execution
// ABOUTME: Separates caller mistakes, launch failures, deadline expiry, and pipe I/O failures

use thiserror::Error;

/// Errors raised by the execution core.
///
/// A non-zero exit status is not an error; it is reported in
/// [`ExecutionResult::exit_code`](crate::ExecutionResult::exit_code).
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command specification was rejected before anything was spawned
    #[error("Invalid command: {0}")]
    Validation(String),

    /// The process could not be started at all
    #[error("Failed to launch {program}: {message}")]
    Launch { program: String, message: String },

    /// The deadline elapsed before the process finished
    #[error("Timeout after {seconds}s")]
    Timeout { seconds: f64 },

    /// Reading from or waiting on a running child failed
    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ExecError::Validation(message.into())
    }

    /// True for [`ExecError::Timeout`]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }

    /// True for [`ExecError::Validation`]
    pub fn is_validation(&self) -> bool {
        matches!(self, ExecError::Validation(_))
    }
}

/// Type alias for Results that return ExecError
pub type Result<T> = std::result::Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_carries_deadline() {
        let err = ExecError::Timeout { seconds: 0.5 };
        assert_eq!(err.to_string(), "Timeout after 0.5s");
        assert!(err.is_timeout());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_launch_message_names_program() {
        let err = ExecError::Launch {
            program: "no-such-binary".to_string(),
            message: "No such file or directory (os error 2)".to_string(),
        };
        assert!(err.to_string().contains("no-such-binary"));
    }
}
