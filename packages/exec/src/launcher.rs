// ABOUTME: Process launcher turning a validated command spec into a running child
// ABOUTME: Resolves shell vs argv invocation and applies workdir, environment and pipes at spawn time

use crate::error::{ExecError, Result};
use crate::spec::{CommandSpec, InvocationMode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// Everything needed to create the OS process, resolved from a [`CommandSpec`]
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    /// Overrides merged on top of the inherited environment
    pub env: HashMap<String, String>,
    /// Whether an input pipe is attached (otherwise stdin is the null device)
    pub pipe_stdin: bool,
}

impl LaunchPlan {
    /// Validate the spec and work out the program and its arguments.
    ///
    /// Shell mode passes the command string verbatim; no quoting or
    /// sanitisation is applied, callers own escaping.
    pub fn from_spec(spec: &CommandSpec) -> Result<Self> {
        spec.validate()?;

        let (program, args) = match spec.mode {
            InvocationMode::Shell => shell_invocation(&spec.command),
            InvocationMode::Argv => {
                let mut parts = shell_words::split(&spec.command).map_err(|e| {
                    ExecError::validation(format!("Could not parse command line: {e}"))
                })?;
                if parts.is_empty() {
                    return Err(ExecError::validation(
                        "Command parsing produced empty argv",
                    ));
                }
                let program = parts.remove(0);
                (program, parts)
            }
        };

        Ok(Self {
            program,
            args,
            workdir: spec.workdir.clone(),
            env: spec.env.clone(),
            pipe_stdin: spec.stdin.is_some(),
        })
    }
}

#[cfg(unix)]
fn shell_invocation(command: &str) -> (String, Vec<String>) {
    (
        "/bin/sh".to_string(),
        vec!["-c".to_string(), command.to_string()],
    )
}

#[cfg(windows)]
fn shell_invocation(command: &str) -> (String, Vec<String>) {
    (
        "cmd".to_string(),
        vec!["/C".to_string(), command.to_string()],
    )
}

/// Creates the OS process for a plan.
///
/// This is the only place a process is spawned, which makes it the seam for
/// observing or substituting process creation.
pub trait Launcher: Send + Sync {
    fn launch(&self, plan: &LaunchPlan) -> Result<Child>;
}

/// Spawns real processes with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLauncher;

impl Launcher for OsLauncher {
    fn launch(&self, plan: &LaunchPlan) -> Result<Child> {
        let mut cmd = Command::new(&plan.program);
        cmd.args(&plan.args)
            .envs(&plan.env)
            .stdin(if plan.pipe_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &plan.workdir {
            cmd.current_dir(dir);
        }

        // Own process group so a deadline kill reaches shell grandchildren
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| ExecError::Launch {
            program: plan.program.clone(),
            message: e.to_string(),
        })?;

        debug!(program = %plan.program, pid = ?child.id(), "Spawned child process");
        Ok(child)
    }
}
