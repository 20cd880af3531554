// ABOUTME: Command executor composing launcher, deadline controller and capture pipeline
// ABOUTME: Produces exactly one ExecutionResult per finished invocation or a typed error

use crate::capture::{self, TextCodec};
use crate::deadline::{terminate, Deadline};
use crate::error::Result;
use crate::launcher::{LaunchPlan, Launcher, OsLauncher};
use crate::result::ExecutionResult;
use crate::spec::{CommandSpec, DEFAULT_ENCODING, DEFAULT_MAX_OUTPUT_BYTES};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tracing::{debug, info, warn};

/// Defaults applied to specs that leave a setting unset
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub encoding: String,
    pub max_output_bytes: usize,
    /// `None` means commands without their own timeout run unbounded
    pub timeout_secs: Option<f64>,
    /// Log command text at info level instead of debug
    pub log_commands: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            timeout_secs: None,
            log_commands: false,
        }
    }
}

/// Runs commands. Cheap to clone; clones share the launcher.
///
/// Invocations are independent and may run concurrently on the same executor.
#[derive(Clone)]
pub struct Executor {
    config: ExecutorConfig,
    launcher: Arc<dyn Launcher>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_launcher(config, Arc::new(OsLauncher))
    }

    pub fn with_launcher(config: ExecutorConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Resolve every setting of `spec` against the defaults without spawning.
    ///
    /// Returns the same `Validation` error [`Executor::execute`] would, so
    /// callers with side effects of their own can reject a spec up front.
    pub fn check(&self, spec: &CommandSpec) -> Result<()> {
        self.prepare(spec).map(|_| ())
    }

    fn prepare(&self, spec: &CommandSpec) -> Result<Prepared> {
        let plan = LaunchPlan::from_spec(spec)?;
        let codec = TextCodec::for_label(
            spec.encoding
                .as_deref()
                .unwrap_or(self.config.encoding.as_str()),
        )?;
        let deadline = Deadline::from_optional_secs(spec.timeout_secs.or(self.config.timeout_secs))?;
        let input = spec
            .stdin
            .as_deref()
            .map(|text| codec.encode(text))
            .transpose()?;
        Ok(Prepared {
            plan,
            codec,
            limit: spec.max_output_bytes.unwrap_or(self.config.max_output_bytes),
            deadline,
            input,
        })
    }

    /// Run one command to completion.
    ///
    /// Fails with `Validation` before spawning, `Launch` if the process cannot
    /// start, `Timeout` if the deadline fires first (the process is killed).
    /// A non-zero exit status is returned as data.
    pub async fn execute(&self, spec: CommandSpec) -> Result<ExecutionResult> {
        let Prepared {
            plan,
            codec,
            limit,
            deadline,
            input,
        } = self.prepare(&spec)?;

        if self.config.log_commands {
            info!(command = %spec.command, mode = ?spec.mode, timeout = ?deadline.seconds(), "Executing command");
        } else {
            debug!(command = %spec.command, mode = ?spec.mode, timeout = ?deadline.seconds(), "Executing command");
        }

        let started = Instant::now();
        let mut child = self.launcher.launch(&plan)?;
        let pid = child.id();
        let stdin_pipe = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // All four must progress together or a full pipe can block the child
        let outcome = deadline
            .race(async {
                let (status, stdout, stderr, fed) = tokio::join!(
                    child.wait(),
                    capture::drain(stdout_pipe, limit),
                    capture::drain(stderr_pipe, limit),
                    feed_stdin(stdin_pipe, input),
                );
                fed?;
                Ok::<_, std::io::Error>((status?, stdout?, stderr?))
            })
            .await;

        let (status, stdout, stderr) = match outcome {
            Some(finished) => finished?,
            None => {
                terminate(&mut child);
                warn!(
                    command = %spec.command,
                    pid = ?pid,
                    timeout = ?deadline.seconds(),
                    "Command timed out, process killed"
                );
                return Err(deadline.expired());
            }
        };

        let (stdout, stdout_truncated) = codec.finish(&stdout);
        let (stderr, stderr_truncated) = codec.finish(&stderr);
        let exit_code = exit_code_of(status);

        debug!(
            pid = ?pid,
            exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            truncated = stdout_truncated || stderr_truncated,
            "Command finished"
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
            timed_out: false,
        })
    }
}

/// A spec resolved against the executor's defaults, ready to launch
struct Prepared {
    plan: LaunchPlan,
    codec: TextCodec,
    limit: usize,
    deadline: Deadline,
    input: Option<Vec<u8>>,
}

/// Raw exit status; a Unix signal death reports the negated signal number
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Write the encoded input and close the pipe.
///
/// A child that exits without reading its input is not an error.
async fn feed_stdin(pipe: Option<ChildStdin>, input: Option<Vec<u8>>) -> std::io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    if let Some(bytes) = input.filter(|b| !b.is_empty()) {
        match pipe.write_all(&bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Child closed stdin before reading all input");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }

    drop(pipe);
    Ok(())
}

/// Run a command with [`ExecutorConfig::default`]
pub async fn execute(spec: CommandSpec) -> Result<ExecutionResult> {
    Executor::default().execute(spec).await
}
