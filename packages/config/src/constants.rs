// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Sandexec

// Sandbox Resource
pub const SANDEXEC_SANDBOX_NAME: &str = "SANDEXEC_SANDBOX_NAME";
pub const SANDEXEC_SANDBOX_IMAGE: &str = "SANDEXEC_SANDBOX_IMAGE";
pub const SANDEXEC_SANDBOX_PORTS: &str = "SANDEXEC_SANDBOX_PORTS";
pub const SANDEXEC_SANDBOX_WORKDIR: &str = "SANDEXEC_SANDBOX_WORKDIR";

// Container Runtime
pub const SANDEXEC_RUNTIME: &str = "SANDEXEC_RUNTIME";
pub const SANDEXEC_RUNTIME_TIMEOUT_SECS: &str = "SANDEXEC_RUNTIME_TIMEOUT_SECS";

// Command Execution
pub const SANDEXEC_MAX_OUTPUT_BYTES: &str = "SANDEXEC_MAX_OUTPUT_BYTES";
pub const SANDEXEC_DEFAULT_TIMEOUT_SECS: &str = "SANDEXEC_DEFAULT_TIMEOUT_SECS";

// Logging
pub const SANDEXEC_VERBOSE: &str = "SANDEXEC_VERBOSE";
pub const RUST_LOG: &str = "RUST_LOG";

// Defaults
pub const DEFAULT_SANDBOX_NAME: &str = "sandbox";
pub const DEFAULT_SANDBOX_IMAGE: &str = "sandbox-image";
pub const DEFAULT_SANDBOX_PORTS: &str = "8080:8080,4041:4040";
pub const DEFAULT_SANDBOX_WORKDIR: &str = "/workspace";
pub const DEFAULT_RUNTIME_TIMEOUT_SECS: f64 = 120.0;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 200_000;
