// ABOUTME: Runs commands inside the sandbox after making sure it is ready
// ABOUTME: Builds a `<runtime> exec ... sh -c <command>` argv and hands it to the execution core

use crate::error::SandboxExecError;
use crate::lifecycle::LifecycleManager;
use crate::resource::SandboxResource;
use sandexec_exec::{CommandSpec, ExecError, ExecutionResult, Executor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub type Result<T> = std::result::Result<T, SandboxExecError>;

/// A command to run inside the sandbox's own shell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SandboxCommand {
    pub command: String,
    pub stdin: Option<String>,
    /// Path inside the container; not checked on the host
    pub workdir: Option<String>,
    pub env: BTreeMap<String, String>,
    pub timeout_secs: Option<f64>,
    pub encoding: Option<String>,
    pub max_output_bytes: Option<usize>,
}

impl SandboxCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    pub fn max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = Some(limit);
        self
    }
}

pub struct SandboxExecutor {
    lifecycle: Arc<LifecycleManager>,
    executor: Executor,
    runtime_binary: String,
    default_workdir: Option<String>,
}

impl SandboxExecutor {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        executor: Executor,
        runtime_binary: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            executor,
            runtime_binary: runtime_binary.into(),
            default_workdir: None,
        }
    }

    /// Working directory used when a command does not name one
    pub fn with_default_workdir(mut self, dir: impl Into<String>) -> Self {
        self.default_workdir = Some(dir.into());
        self
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    /// Argument vector for the runtime client, starting with the binary
    pub fn exec_args(&self, resource: &SandboxResource, command: &SandboxCommand) -> Vec<String> {
        let mut args = vec![self.runtime_binary.clone(), "exec".to_string()];
        if command.stdin.is_some() {
            args.push("-i".to_string());
        }
        if let Some(dir) = command.workdir.as_ref().or(self.default_workdir.as_ref()) {
            args.push("-w".to_string());
            args.push(dir.clone());
        }
        for (key, value) in &command.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(resource.name.clone());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(command.command.clone());
        args
    }

    /// Host-side spec that runs `command` through the runtime client.
    ///
    /// The sandbox's env and workdir travel as `exec` flags, so they are
    /// checked here rather than by the execution core.
    fn spec_for(&self, resource: &SandboxResource, command: SandboxCommand) -> Result<CommandSpec> {
        if command.command.trim().is_empty() {
            return Err(ExecError::Validation("Empty command".to_string()).into());
        }
        if let Some(key) = command.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(
                ExecError::Validation(format!("Invalid environment variable name: {key:?}"))
                    .into(),
            );
        }

        let mut spec = CommandSpec::from_args(self.exec_args(resource, &command));
        if let Some(input) = command.stdin {
            spec = spec.stdin(input);
        }
        if let Some(seconds) = command.timeout_secs {
            spec = spec.timeout_secs(seconds);
        }
        if let Some(label) = command.encoding {
            spec = spec.encoding(label);
        }
        if let Some(limit) = command.max_output_bytes {
            spec = spec.max_output_bytes(limit);
        }
        Ok(spec)
    }

    /// Ensure the sandbox is running, then run `command` inside it.
    ///
    /// An invalid command is rejected before the sandbox is touched. A
    /// deadline kills the local runtime client; the in-container process is
    /// left to the runtime.
    pub async fn run(
        &self,
        resource: &SandboxResource,
        command: SandboxCommand,
    ) -> Result<ExecutionResult> {
        let spec = self.spec_for(resource, command)?;
        self.executor.check(&spec)?;

        self.lifecycle.ensure_ready(resource, false).await?;

        debug!(resource = %resource.name, "Running command in sandbox");
        Ok(self.executor.execute(spec).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use crate::resource::SandboxState;
    use crate::runtime::ContainerRuntime;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Runtime that must never be reached
    struct UnreachableRuntime;

    #[async_trait]
    impl ContainerRuntime for UnreachableRuntime {
        async fn state(&self, name: &str) -> crate::error::Result<SandboxState> {
            Err(LifecycleError::Api(format!("unexpected query for {name}")))
        }
        async fn create_and_start(&self, _: &SandboxResource) -> crate::error::Result<()> {
            Err(LifecycleError::Api("unexpected create".to_string()))
        }
        async fn start(&self, _: &str) -> crate::error::Result<()> {
            Err(LifecycleError::Api("unexpected start".to_string()))
        }
        async fn unpause(&self, _: &str) -> crate::error::Result<()> {
            Err(LifecycleError::Api("unexpected unpause".to_string()))
        }
        async fn remove(&self, _: &str) -> crate::error::Result<()> {
            Err(LifecycleError::Api("unexpected remove".to_string()))
        }
    }

    fn executor() -> SandboxExecutor {
        let lifecycle = Arc::new(LifecycleManager::new(Arc::new(UnreachableRuntime)));
        SandboxExecutor::new(lifecycle, Executor::default(), "docker")
    }

    #[test]
    fn test_exec_args_minimal() {
        let resource = SandboxResource::new("sandbox", "img");
        let args = executor().exec_args(&resource, &SandboxCommand::new("ls -la | wc -l"));

        assert_eq!(
            args,
            vec!["docker", "exec", "sandbox", "sh", "-c", "ls -la | wc -l"]
        );
    }

    #[test]
    fn test_exec_args_full() {
        let resource = SandboxResource::new("box", "img");
        let command = SandboxCommand::new("cat > notes.txt")
            .stdin("hello")
            .workdir("/srv")
            .env("B", "2")
            .env("A", "1 1");

        let args = executor()
            .with_default_workdir("/workspace")
            .exec_args(&resource, &command);

        assert_eq!(
            args,
            vec![
                "docker", "exec", "-i", "-w", "/srv", "-e", "A=1 1", "-e", "B=2", "box", "sh",
                "-c", "cat > notes.txt"
            ]
        );
    }

    #[test]
    fn test_default_workdir_applies() {
        let resource = SandboxResource::new("sandbox", "img");
        let args = executor()
            .with_default_workdir("/workspace")
            .exec_args(&resource, &SandboxCommand::new("pwd"));

        assert_eq!(&args[2..4], &["-w", "/workspace"]);
    }

    #[tokio::test]
    async fn test_blank_command_is_rejected_before_lifecycle() {
        let resource = SandboxResource::new("sandbox", "img");
        let err = executor()
            .run(&resource, SandboxCommand::new("  "))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SandboxExecError::Exec(ExecError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_env_name_is_rejected_before_lifecycle() {
        let resource = SandboxResource::new("sandbox", "img");
        let err = executor()
            .run(&resource, SandboxCommand::new("env").env("A=B", "c"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SandboxExecError::Exec(ExecError::Validation(_))
        ));
    }

    #[rstest]
    #[case::negative_timeout(SandboxCommand::new("true").timeout_secs(-1.0))]
    #[case::zero_timeout(SandboxCommand::new("true").timeout_secs(0.0))]
    #[case::unknown_encoding(SandboxCommand::new("true").encoding("klingon"))]
    #[case::unencodable_stdin(SandboxCommand::new("cat").stdin("\u{65E5}").encoding("latin1"))]
    #[tokio::test]
    async fn test_invalid_settings_are_rejected_before_lifecycle(#[case] command: SandboxCommand) {
        let resource = SandboxResource::new("sandbox", "img");
        let err = executor().run(&resource, command).await.unwrap_err();

        assert!(
            matches!(err, SandboxExecError::Exec(ExecError::Validation(_))),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_lifecycle_failure_is_surfaced() {
        let resource = SandboxResource::new("sandbox", "img");
        let err = executor()
            .run(&resource, SandboxCommand::new("true"))
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxExecError::Lifecycle(_)));
    }
}
