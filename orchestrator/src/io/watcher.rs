//! Adapter for the upstream watcher that fills the pending folder.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::io::process::{CommandSpec, command_from_argv, run_command};
use crate::io::reporter::Reporter;

/// Result of one watcher run. Every non-`Completed` variant fails the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherOutcome {
    Completed,
    Failed { exit_code: Option<i32>, stderr: String },
    TimedOut { timeout: Duration },
    Cancelled,
    SpawnFailed { error: String },
}

impl WatcherOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Abstraction over watcher backends.
pub trait Watcher {
    fn run(&self) -> WatcherOutcome;
}

/// Watcher that spawns the configured program with cwd = the scripts folder.
pub struct CommandWatcher {
    pub argv: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    pub cancel: Option<CancelFlag>,
}

impl Watcher for CommandWatcher {
    #[instrument(skip_all, fields(program = ?self.argv.first(), timeout_secs = self.timeout.as_secs()))]
    fn run(&self) -> WatcherOutcome {
        match self.spawn() {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "watcher could not run");
                WatcherOutcome::SpawnFailed {
                    error: format!("{err:#}"),
                }
            }
        }
    }
}

impl CommandWatcher {
    fn spawn(&self) -> Result<WatcherOutcome> {
        let mut cmd = command_from_argv(&self.argv)?;
        cmd.current_dir(&self.workdir);
        let output = run_command(CommandSpec {
            cmd,
            stdin: None,
            timeout: self.timeout,
            output_limit_bytes: self.output_limit_bytes,
            cancel: self.cancel.as_ref(),
        })?;

        if output.cancelled {
            return Ok(WatcherOutcome::Cancelled);
        }
        if output.timed_out {
            return Ok(WatcherOutcome::TimedOut {
                timeout: self.timeout,
            });
        }
        if !output.status.success() {
            return Ok(WatcherOutcome::Failed {
                exit_code: output.status.code(),
                stderr: output.stderr_lossy().trim().to_string(),
            });
        }
        info!("watcher completed");
        Ok(WatcherOutcome::Completed)
    }
}

/// Run the watcher and report the outcome with one status line.
pub fn run_watcher<W: Watcher + ?Sized, R: Reporter + ?Sized>(
    watcher: &W,
    reporter: &R,
) -> WatcherOutcome {
    reporter.emit("Running watcher...");
    let outcome = watcher.run();
    match &outcome {
        WatcherOutcome::Completed => reporter.emit("Watcher completed"),
        WatcherOutcome::Failed { exit_code, stderr } => {
            let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            if stderr.is_empty() {
                reporter.emit(&format!("Watcher error: exit {code}"));
            } else {
                reporter.emit(&format!("Watcher error: exit {code}: {stderr}"));
            }
        }
        WatcherOutcome::TimedOut { timeout } => reporter.emit(&format!(
            "Watcher timeout: no result after {}s",
            timeout.as_secs()
        )),
        WatcherOutcome::Cancelled => reporter.emit("Watcher cancelled"),
        WatcherOutcome::SpawnFailed { error } => {
            reporter.emit(&format!("Watcher exception: {error}"));
        }
    }
    outcome
}
