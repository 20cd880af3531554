// ABOUTME: Deadline controller racing process completion against an optional timeout
// ABOUTME: On expiry the child (and its process group on Unix) is killed without waiting for shutdown

use crate::error::{ExecError, Result};
use crate::spec::deadline_from_secs;
use std::future::Future;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

/// Optional wall-clock limit for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Deadline {
    limit: Option<(Duration, f64)>,
}

impl Deadline {
    /// No limit: waits for as long as the process runs
    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    pub fn from_secs(seconds: f64) -> Result<Self> {
        let duration = deadline_from_secs(seconds)?;
        Ok(Self {
            limit: Some((duration, seconds)),
        })
    }

    pub fn from_optional_secs(seconds: Option<f64>) -> Result<Self> {
        seconds.map_or(Ok(Self::unbounded()), Self::from_secs)
    }

    pub fn is_bounded(&self) -> bool {
        self.limit.is_some()
    }

    pub fn seconds(&self) -> Option<f64> {
        self.limit.map(|(_, seconds)| seconds)
    }

    /// Run `work` to completion or until the deadline passes.
    ///
    /// Returns `None` if the deadline won; `work` is dropped at that point.
    pub async fn race<F>(&self, work: F) -> Option<F::Output>
    where
        F: Future,
    {
        match self.limit {
            None => Some(work.await),
            Some((duration, _)) => tokio::time::timeout(duration, work).await.ok(),
        }
    }

    pub fn expired(&self) -> ExecError {
        ExecError::Timeout {
            seconds: self.seconds().unwrap_or_default(),
        }
    }
}

/// Best-effort forced termination.
///
/// A child that already exited is not an error. Does not wait for the
/// process to be reaped; `kill_on_drop` and the runtime's orphan reaper
/// take care of that.
pub fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => debug!(pid, "Killed process group"),
            Err(Errno::ESRCH) => debug!(pid, "Process group already gone"),
            Err(e) => warn!(pid, error = %e, "Failed to kill process group"),
        }
    }

    match child.start_kill() {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
            debug!("Child already exited before kill")
        }
        Err(e) => warn!(error = %e, "Failed to kill child process"),
    }
}
