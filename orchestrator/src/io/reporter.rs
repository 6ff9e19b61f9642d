//! Status lines for operators: stdout plus one append-only log file per day.
//!
//! The reporter is a sink. A log file that cannot be opened or appended to is
//! only traced; the cycle that emitted the line carries on.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing::warn;

/// Log files are named `<prefix>_<YYYYMMDD>.log`.
pub const LOG_FILE_PREFIX: &str = "orchestrator";

/// Source of local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Capability to emit one human-readable status line.
pub trait Reporter {
    fn emit(&self, message: &str);
}

/// Reporter writing `[YYYY-MM-DD HH:MM:SS] message` to stdout and the dated log file.
pub struct StatusReporter<C: Clock = SystemClock> {
    logs_dir: PathBuf,
    clock: C,
    echo_stdout: bool,
}

impl StatusReporter<SystemClock> {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(logs_dir, SystemClock)
    }
}

impl<C: Clock> StatusReporter<C> {
    pub fn with_clock(logs_dir: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            clock,
            echo_stdout: true,
        }
    }

    /// Keep lines out of stdout (file only).
    pub fn quiet(mut self) -> Self {
        self.echo_stdout = false;
        self
    }

    /// Log file used for lines emitted at `now`.
    pub fn log_path_for(&self, now: NaiveDateTime) -> PathBuf {
        log_path(&self.logs_dir, now)
    }
}

impl<C: Clock> Reporter for StatusReporter<C> {
    fn emit(&self, message: &str) {
        let now = self.clock.now();
        let line = format_line(now, message);
        if self.echo_stdout {
            println!("{line}");
        }
        let path = self.log_path_for(now);
        if let Err(err) = append_line(&path, &line) {
            warn!(err = %format!("{err:#}"), "status line not persisted");
        }
    }
}

pub fn format_line(now: NaiveDateTime, message: &str) -> String {
    format!("[{}] {message}", now.format("%Y-%m-%d %H:%M:%S"))
}

pub fn log_path(logs_dir: &Path, now: NaiveDateTime) -> PathBuf {
    logs_dir.join(format!("{LOG_FILE_PREFIX}_{}.log", now.format("%Y%m%d")))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("append log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixedClock;
    use std::fs;

    #[test]
    fn appends_timestamped_lines_to_dated_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let clock = FixedClock::at("2024-03-09 14:05:01");
        let reporter = StatusReporter::with_clock(temp.path(), clock).quiet();

        reporter.emit("first");
        reporter.emit("second");

        let contents =
            fs::read_to_string(temp.path().join("orchestrator_20240309.log")).expect("read log");
        assert_eq!(
            contents,
            "[2024-03-09 14:05:01] first\n[2024-03-09 14:05:01] second\n"
        );
    }

    #[test]
    fn each_day_gets_its_own_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let clock = FixedClock::at("2024-03-09 23:59:59");
        let reporter = StatusReporter::with_clock(temp.path(), clock.clone()).quiet();
        reporter.emit("late");
        clock.set("2024-03-10 00:00:01");
        reporter.emit("early");

        assert!(temp.path().join("orchestrator_20240309.log").is_file());
        let next = fs::read_to_string(temp.path().join("orchestrator_20240310.log"))
            .expect("read next day");
        assert_eq!(next, "[2024-03-10 00:00:01] early\n");
    }

    #[test]
    fn missing_logs_dir_does_not_panic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let reporter =
            StatusReporter::with_clock(temp.path().join("gone"), FixedClock::at("2024-01-01 00:00:00"))
                .quiet();
        reporter.emit("still fine");
        assert!(!temp.path().join("gone").exists());
    }
}
