// ABOUTME: Caller-supplied command specification and invocation modes
// ABOUTME: Builder-style construction plus the checks that run before any process is spawned

use crate::error::{ExecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Per-stream capture limit used when neither the spec nor the executor sets one
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 200_000;

/// Encoding label used when neither the spec nor the executor sets one
pub const DEFAULT_ENCODING: &str = "utf-8";

/// How the command string is turned into a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Hand the whole string to the system shell (pipes and redirection work)
    #[default]
    Shell,
    /// Split with shell-lexical rules and run the first token directly
    Argv,
}

/// One command invocation.
///
/// `None` for `encoding`, `max_output_bytes` or `timeout_secs` means "use the
/// executor's configured default". The executor default for the timeout is
/// itself unbounded unless configured, so a command without any deadline
/// blocks its caller until the process and both output streams finish.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub command: String,
    pub stdin: Option<String>,
    pub workdir: Option<PathBuf>,
    pub timeout_secs: Option<f64>,
    pub mode: InvocationMode,
    pub env: HashMap<String, String>,
    pub encoding: Option<String>,
    pub max_output_bytes: Option<usize>,
}

impl CommandSpec {
    /// Command run through the system shell
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            mode: InvocationMode::Shell,
            ..Default::default()
        }
    }

    /// Command tokenized and executed without a shell
    pub fn argv(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            mode: InvocationMode::Argv,
            ..Default::default()
        }
    }

    /// Argv-mode command built from already separated arguments.
    ///
    /// The arguments are quoted so that tokenization yields them back unchanged.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::argv(shell_words::join(args))
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
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

    /// Checks that do not depend on tokenization.
    ///
    /// Runs before the launcher is involved, so a rejected spec never spawns.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(ExecError::validation("Empty command"));
        }

        if let Some(dir) = &self.workdir {
            if !dir.is_dir() {
                return Err(ExecError::validation(format!(
                    "Invalid workdir: {}",
                    dir.display()
                )));
            }
        }

        if let Some(seconds) = self.timeout_secs {
            deadline_from_secs(seconds)?;
        }

        if self.env.keys().any(|k| k.is_empty() || k.contains('=')) {
            return Err(ExecError::validation(
                "Environment variable names must be non-empty and must not contain '='",
            ));
        }

        Ok(())
    }
}

/// Converts a timeout in seconds into a deadline, rejecting nonsense values
pub(crate) fn deadline_from_secs(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ExecError::validation(format!(
            "Timeout must be a positive number of seconds, got {seconds}"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ExecError::validation(format!("Timeout out of range: {e}")))
}
