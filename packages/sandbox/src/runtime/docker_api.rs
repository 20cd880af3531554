// ABOUTME: Container runtime backend over the Docker Engine HTTP API
// ABOUTME: Uses bollard; 404 means the container is absent, 409 means the name is taken

use super::ContainerRuntime;
use crate::error::{LifecycleError, Result};
use crate::resource::{SandboxResource, SandboxState};
use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
        StartContainerOptions,
    },
    errors::Error as BollardError,
    image::CreateImageOptions,
    models::{HostConfig, PortBinding},
    Docker,
};
use futures::TryStreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

pub struct DockerApi {
    client: Docker,
}

impl DockerApi {
    /// Connect using `DOCKER_HOST` or the platform default socket
    pub fn connect(timeout_secs: u64) -> Result<Self> {
        let client = Docker::connect_with_defaults()
            .map_err(|e| LifecycleError::Api(e.to_string()))?
            .with_timeout(std::time::Duration::from_secs(timeout_secs));
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Docker) -> Self {
        Self { client }
    }

    fn container_config(resource: &SandboxResource) -> Config<String> {
        let mut exposed_ports = HashMap::new();
        let mut port_bindings = HashMap::new();

        for port in &resource.ports {
            let container_port = format!("{}/tcp", port.container_port);
            exposed_ports.insert(container_port.clone(), HashMap::new());
            port_bindings.insert(
                container_port,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
        }

        let host_config = HostConfig {
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            ..Default::default()
        };

        Config {
            image: Some(resource.image.clone()),
            cmd: Some(resource.keep_alive.clone()),
            labels: Some(resource.effective_labels().into_iter().collect()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.client.inspect_image(image).await {
            Ok(_) => return Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(runtime_error("inspect image", image, e)),
        }

        info!(image, "Pulling sandbox image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let progress: Vec<_> = self
            .client
            .create_image(Some(options), None, None)
            .try_collect()
            .await
            .map_err(|e| runtime_error("pull", image, e))?;

        if let Some(error) = progress.into_iter().find_map(|info| info.error) {
            return Err(LifecycleError::Runtime {
                operation: "pull".to_string(),
                resource: image.to_string(),
                stderr: error,
            });
        }
        Ok(())
    }
}

fn runtime_error(operation: &str, resource: &str, error: BollardError) -> LifecycleError {
    LifecycleError::Runtime {
        operation: operation.to_string(),
        resource: resource.to_string(),
        stderr: error.to_string(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerApi {
    async fn state(&self, name: &str) -> Result<SandboxState> {
        let inspect = match self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => inspect,
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(SandboxState::Absent),
            Err(e) => return Err(runtime_error("query", name, e)),
        };

        let status = inspect
            .state
            .as_ref()
            .and_then(|state| state.status.as_ref())
            .map(|status| status.to_string())
            .unwrap_or_default();
        Ok(SandboxState::from_status(&status))
    }

    async fn create_and_start(&self, resource: &SandboxResource) -> Result<()> {
        info!(resource = %resource.name, image = %resource.image, "Creating sandbox");
        self.ensure_image(&resource.image).await?;

        let options = CreateContainerOptions {
            name: resource.name.clone(),
            platform: None,
        };
        let created = match self
            .client
            .create_container(Some(options), Self::container_config(resource))
            .await
        {
            Ok(created) => created,
            Err(BollardError::DockerResponseServerError {
                status_code: 409, ..
            }) => {
                return Err(LifecycleError::AlreadyExists {
                    resource: resource.name.clone(),
                })
            }
            Err(e) => return Err(runtime_error("create", &resource.name, e)),
        };
        debug!(resource = %resource.name, id = %created.id, "Sandbox created");

        self.start(&resource.name).await
    }

    async fn start(&self, name: &str) -> Result<()> {
        match self
            .client
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
        {
            // 304: already started
            Ok(())
            | Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(runtime_error("start", name, e)),
        }
    }

    async fn unpause(&self, name: &str) -> Result<()> {
        info!(resource = %name, "Unpausing sandbox");
        self.client
            .unpause_container(name)
            .await
            .map_err(|e| runtime_error("unpause", name, e))
    }

    async fn remove(&self, name: &str) -> Result<()> {
        info!(resource = %name, "Removing sandbox");
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.client.remove_container(name, Some(options)).await {
            Ok(())
            | Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(runtime_error("remove", name, e)),
        }
    }
}
