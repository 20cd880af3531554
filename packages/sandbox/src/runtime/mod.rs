// ABOUTME: Container runtime trait used by the lifecycle manager
// ABOUTME: Implemented by the runtime CLI backend and the Docker Engine API backend

use crate::error::Result;
use crate::resource::{SandboxResource, SandboxState};
use async_trait::async_trait;

pub mod docker_cli;
#[cfg(feature = "docker-api")]
pub mod docker_api;

pub use docker_cli::DockerCli;
#[cfg(feature = "docker-api")]
pub use docker_api::DockerApi;

/// Minimal set of runtime operations needed to keep a sandbox ready
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Query the current state of the container called `name`
    async fn state(&self, name: &str) -> Result<SandboxState>;

    /// Create the container from `resource.image` and start it detached.
    ///
    /// Returns `LifecycleError::AlreadyExists` when the name is taken.
    async fn create_and_start(&self, resource: &SandboxResource) -> Result<()>;

    /// Start an existing, stopped container in place
    async fn start(&self, name: &str) -> Result<()>;

    /// Resume a paused container
    async fn unpause(&self, name: &str) -> Result<()>;

    /// Remove the container, running or not
    async fn remove(&self, name: &str) -> Result<()>;
}
