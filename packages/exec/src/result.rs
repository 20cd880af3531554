// ABOUTME: Immutable result of one finished command invocation
// ABOUTME: Exit status, decoded (possibly truncated) output, and flags

use serde::{Deserialize, Serialize};

/// Outcome of a command that ran to completion.
///
/// Deadline expiry is reported as [`ExecError::Timeout`](crate::ExecError::Timeout)
/// rather than as a result, so `timed_out` is always `false` on a returned value.
/// The field is kept so serialized results have a stable shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Raw exit status; `-N` when the process was ended by signal `N` (Unix)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// True if either stream exceeded the byte limit
    pub truncated: bool,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_snake_case_fields() {
        let result = ExecutionResult {
            exit_code: 3,
            stdout: "out".to_string(),
            stderr: String::new(),
            truncated: false,
            timed_out: false,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exit_code"], 3);
        assert_eq!(json["stderr"], "");
        assert_eq!(json["timed_out"], false);
        assert!(!result.success());
    }
}
