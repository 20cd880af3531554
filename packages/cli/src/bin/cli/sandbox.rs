// ABOUTME: CLI commands for the sandbox container (ensure, status)
// ABOUTME: Also selects the runtime backend used by every sandbox operation

use super::Context;
use anyhow::{Context as _, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use sandexec_config::Settings;
use sandexec_sandbox::{ContainerRuntime, DockerApi, DockerCli, SandboxState};
use std::sync::Arc;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Shell out to the docker/podman binary
    Cli,
    /// Talk to the Docker Engine API directly
    Api,
}

impl Backend {
    pub fn runtime(&self, settings: &Settings) -> Result<Arc<dyn ContainerRuntime>> {
        match self {
            Backend::Cli => Ok(Arc::new(DockerCli::from_settings(settings))),
            Backend::Api => {
                let timeout = settings.runtime_timeout_secs.ceil() as u64;
                let api = DockerApi::connect(timeout).context("Failed to connect to Docker")?;
                Ok(Arc::new(api))
            }
        }
    }
}

#[derive(Subcommand)]
pub enum SandboxCommands {
    /// Make sure the sandbox container exists and is running
    Ensure {
        /// Remove any existing sandbox first, discarding its filesystem
        #[arg(long)]
        recreate: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the sandbox container's current state
    Status {
        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },
}

impl SandboxCommands {
    pub async fn execute(&self, context: &Context) -> Result<i32> {
        match self {
            SandboxCommands::Ensure { recreate, json } => {
                ensure_command(context, *recreate, *json).await
            }
            SandboxCommands::Status { json } => status_command(context, *json).await,
        }
    }
}

async fn ensure_command(context: &Context, recreate: bool, json: bool) -> Result<i32> {
    let resource = context.resource();
    let outcome = context
        .lifecycle()?
        .ensure_ready(&resource, recreate)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "name": resource.name, "created": outcome.created })
        );
    } else if outcome.created {
        println!(
            "{} {} ({})",
            "Created sandbox".green().bold(),
            resource.name,
            resource.image
        );
    } else {
        println!("{} {}", "Sandbox ready:".green(), resource.name);
    }
    Ok(0)
}

async fn status_command(context: &Context, json: bool) -> Result<i32> {
    let resource = context.resource();
    let state = context.lifecycle()?.state(&resource).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "name": resource.name, "state": state })
        );
    } else {
        let label = match state {
            SandboxState::Running => state.to_string().green(),
            SandboxState::Stopped | SandboxState::Paused => state.to_string().yellow(),
            SandboxState::Absent => state.to_string().dimmed(),
        };
        println!("{}: {}", resource.name, label);
    }
    Ok(0)
}
