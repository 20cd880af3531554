// ABOUTME: Container runtime backend that drives the docker or podman binary
// ABOUTME: Every runtime command goes through the execution core with a deadline and bounded output

use super::ContainerRuntime;
use crate::error::{LifecycleError, Result};
use crate::resource::{SandboxResource, SandboxState};
use async_trait::async_trait;
use sandexec_config::{RuntimeKind, Settings};
use sandexec_exec::{CommandSpec, ExecutionResult, Executor};
use tracing::{debug, info};

/// Runtime output mentioning a name collision on create
const NAME_CONFLICT_HINTS: &[&str] = &["already in use", "Conflict."];

pub struct DockerCli {
    binary: String,
    executor: Executor,
    timeout_secs: f64,
}

impl DockerCli {
    pub fn new(kind: RuntimeKind, timeout_secs: f64) -> Self {
        Self::with_executor(kind.binary(), Executor::default(), timeout_secs)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.runtime, settings.runtime_timeout_secs)
    }

    /// Use an explicit binary path and executor (tests point this at a stand-in script)
    pub fn with_executor(binary: impl Into<String>, executor: Executor, timeout_secs: f64) -> Self {
        Self {
            binary: binary.into(),
            executor,
            timeout_secs,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn state_args(name: &str) -> Vec<String> {
        vec![
            "ps".to_string(),
            "-a".to_string(),
            "--filter".to_string(),
            format!("name={}", name),
            "--format".to_string(),
            "{{.Names}}\t{{.State}}".to_string(),
        ]
    }

    fn create_args(resource: &SandboxResource) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            resource.name.clone(),
        ];
        for port in &resource.ports {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        for (key, value) in resource.effective_labels() {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(resource.image.clone());
        args.extend(resource.keep_alive.iter().cloned());
        args
    }

    /// Pick the line for exactly `name` out of `ps` output.
    ///
    /// The name filter is a substring match, so `sandbox-2` also shows up for `sandbox`.
    fn parse_state(name: &str, stdout: &str) -> SandboxState {
        stdout
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .find(|(names, _)| names.split(',').any(|n| n.trim().trim_start_matches('/') == name))
            .map(|(_, status)| SandboxState::from_status(status))
            .unwrap_or(SandboxState::Absent)
    }

    async fn run(&self, operation: &str, args: Vec<String>) -> Result<ExecutionResult> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.binary.clone());
        argv.extend(args);

        let spec = CommandSpec::from_args(&argv).timeout_secs(self.timeout_secs);
        debug!(runtime = %self.binary, operation, "Running runtime command");

        self.executor
            .execute(spec)
            .await
            .map_err(|source| LifecycleError::Exec {
                operation: operation.to_string(),
                source,
            })
    }

    fn check(operation: &str, resource: &str, result: ExecutionResult) -> Result<ExecutionResult> {
        if result.success() {
            return Ok(result);
        }
        let stderr = result.stderr.trim().to_string();
        if operation == "create" && NAME_CONFLICT_HINTS.iter().any(|h| stderr.contains(h)) {
            return Err(LifecycleError::AlreadyExists {
                resource: resource.to_string(),
            });
        }
        Err(LifecycleError::Runtime {
            operation: operation.to_string(),
            resource: resource.to_string(),
            stderr,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn state(&self, name: &str) -> Result<SandboxState> {
        let result = self.run("query", Self::state_args(name)).await?;
        let result = Self::check("query", name, result)?;
        Ok(Self::parse_state(name, &result.stdout))
    }

    async fn create_and_start(&self, resource: &SandboxResource) -> Result<()> {
        info!(resource = %resource.name, image = %resource.image, "Creating sandbox");
        let result = self.run("create", Self::create_args(resource)).await?;
        let result = Self::check("create", &resource.name, result)?;
        debug!(resource = %resource.name, id = %result.stdout.trim(), "Sandbox created");
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        info!(resource = %name, "Starting stopped sandbox");
        let result = self
            .run("start", vec!["start".to_string(), name.to_string()])
            .await?;
        Self::check("start", name, result)?;
        Ok(())
    }

    async fn unpause(&self, name: &str) -> Result<()> {
        info!(resource = %name, "Unpausing sandbox");
        let result = self
            .run("unpause", vec!["unpause".to_string(), name.to_string()])
            .await?;
        Self::check("unpause", name, result)?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        info!(resource = %name, "Removing sandbox");
        let result = self
            .run(
                "remove",
                vec!["rm".to_string(), "-f".to_string(), name.to_string()],
            )
            .await?;
        Self::check("remove", name, result)?;
        Ok(())
    }
}
