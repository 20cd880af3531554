// ABOUTME: Sandbox lifecycle management and in-sandbox command execution for Sandexec
// ABOUTME: Keeps one long-lived container ready and routes commands into it

pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod resource;
pub mod runtime;

pub use error::{LifecycleError, SandboxExecError};
pub use executor::{SandboxCommand, SandboxExecutor};
pub use lifecycle::{EnsureOutcome, LifecycleManager};
pub use resource::{SandboxResource, SandboxState, MANAGED_LABEL};
pub use runtime::{ContainerRuntime, DockerCli};

#[cfg(feature = "docker-api")]
pub use runtime::DockerApi;
