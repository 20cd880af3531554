// ABOUTME: Maps command results and errors onto process exit codes
// ABOUTME: Child status is passed through; timeouts exit 124 like coreutils `timeout`

use sandexec_exec::{ExecError, ExecutionResult};
use sandexec_sandbox::SandboxExecError;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_TIMEOUT: i32 = 124;

/// Offset added to a signal number, as shells report signal deaths
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Exit status that mirrors the child's.
///
/// A child killed by signal `N` reports `-N`; that maps to `128 + N`.
pub fn exit_code_for(result: &ExecutionResult) -> i32 {
    match result.exit_code {
        code if (0..=255).contains(&code) => code,
        code if code > 255 => 255,
        code if (-127..0).contains(&code) => SIGNAL_EXIT_BASE - code,
        _ => EXIT_FAILURE,
    }
}

pub fn is_timeout(error: &anyhow::Error) -> bool {
    if let Some(err) = error.downcast_ref::<ExecError>() {
        return err.is_timeout();
    }
    matches!(
        error.downcast_ref::<SandboxExecError>(),
        Some(SandboxExecError::Exec(err)) if err.is_timeout()
    )
}

pub fn exit_code_for_error(error: &anyhow::Error) -> i32 {
    if is_timeout(error) {
        EXIT_TIMEOUT
    } else {
        EXIT_FAILURE
    }
}
