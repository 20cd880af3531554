// ABOUTME: Error types for sandbox lifecycle and in-sandbox execution
// ABOUTME: Runtime failures keep the captured stderr of the command that failed

use sandexec_exec::ExecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Runtime failed to {operation} {resource}: {stderr}")]
    Runtime {
        operation: String,
        resource: String,
        stderr: String,
    },

    #[error("Sandbox {resource} already exists")]
    AlreadyExists { resource: String },

    #[error("Could not run runtime command to {operation}: {source}")]
    Exec {
        operation: String,
        #[source]
        source: ExecError,
    },

    #[error("Container API error: {0}")]
    Api(String),
}

impl LifecycleError {
    /// Captured diagnostic output of the failing runtime command, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            LifecycleError::Runtime { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Error, Debug)]
pub enum SandboxExecError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_carries_stderr() {
        let err = LifecycleError::Runtime {
            operation: "create".to_string(),
            resource: "sandbox".to_string(),
            stderr: "Unable to find image 'nope:latest' locally".to_string(),
        };

        assert_eq!(err.stderr(), Some("Unable to find image 'nope:latest' locally"));
        assert!(err.to_string().contains("create sandbox"));
        assert!(err.to_string().contains("Unable to find image"));
    }

    #[test]
    fn test_sandbox_exec_error_is_transparent() {
        let err: SandboxExecError = ExecError::Timeout { seconds: 1.5 }.into();
        assert_eq!(err.to_string(), "Timeout after 1.5s");
    }
}
