// ABOUTME: Sandboxed command-execution core for Sandexec
// ABOUTME: Launches a process, feeds stdin, enforces a deadline, and returns bounded decoded output

pub mod capture;
pub mod deadline;
pub mod error;
pub mod executor;
pub mod launcher;
pub mod result;
pub mod spec;

// Re-export commonly used types
pub use capture::{TextCodec, TRUNCATION_MARKER};
pub use deadline::Deadline;
pub use error::{ExecError, Result};
pub use executor::{execute, Executor, ExecutorConfig};
pub use launcher::{LaunchPlan, Launcher, OsLauncher};
pub use result::ExecutionResult;
pub use spec::{CommandSpec, InvocationMode, DEFAULT_ENCODING, DEFAULT_MAX_OUTPUT_BYTES};
