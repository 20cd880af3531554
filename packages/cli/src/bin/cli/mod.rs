pub mod run;
pub mod sandbox;

use anyhow::Result;
use sandexec_config::Settings;
use sandexec_exec::{Executor, ExecutorConfig};
use sandexec_sandbox::{LifecycleManager, SandboxExecutor, SandboxResource};
use std::sync::Arc;

use sandbox::Backend;

/// Everything a subcommand needs, resolved once at start-up
pub struct Context {
    pub settings: Settings,
    pub verbose: bool,
    pub backend: Backend,
}

impl Context {
    pub fn executor(&self) -> Executor {
        Executor::new(ExecutorConfig {
            max_output_bytes: self.settings.max_output_bytes,
            timeout_secs: self.settings.default_timeout_secs,
            log_commands: self.verbose,
            ..Default::default()
        })
    }

    pub fn resource(&self) -> SandboxResource {
        SandboxResource::from_settings(&self.settings)
    }

    pub fn lifecycle(&self) -> Result<Arc<LifecycleManager>> {
        let runtime = self.backend.runtime(&self.settings)?;
        Ok(Arc::new(LifecycleManager::new(runtime)))
    }

    pub fn sandbox_executor(&self) -> Result<SandboxExecutor> {
        Ok(SandboxExecutor::new(
            self.lifecycle()?,
            self.executor(),
            self.settings.runtime.binary(),
        )
        .with_default_workdir(&self.settings.sandbox_workdir))
    }
}
