//! Agent abstraction for per-item plan generation.
//!
//! The [`Agent`] trait decouples the cycle from the actual reasoning backend
//! (any CLI that prints a plan on stdout). Tests use scripted agents that
//! return predetermined replies without spawning processes.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::core::plan_format::inspect_plan;
use crate::io::config::PromptVia;
use crate::io::item_store::Item;
use crate::io::process::{CommandSpec, command_from_argv, run_command};
use crate::io::prompt::{PlanPromptInputs, render_plan_prompt};

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub item_name: String,
    /// Rendered prompt text.
    pub prompt: String,
    /// Working directory for the agent process (the vault root).
    pub workdir: PathBuf,
    pub timeout: Duration,
}

/// What the agent process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl AgentReply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: false,
            cancelled: false,
        }
    }

    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
            timed_out: false,
            cancelled: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
            cancelled: false,
        }
    }
}

/// Abstraction over agent backends.
pub trait Agent {
    /// Run the agent once. `Err` means the process could not be started.
    fn invoke(&self, request: &AgentRequest) -> Result<AgentReply>;
}

/// Agent that spawns the configured command line.
pub struct CommandAgent {
    pub argv: Vec<String>,
    pub prompt_via: PromptVia,
    pub output_limit_bytes: usize,
    pub cancel: Option<CancelFlag>,
}

impl Agent for CommandAgent {
    #[instrument(skip_all, fields(item = %request.item_name, timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &AgentRequest) -> Result<AgentReply> {
        info!(workdir = %request.workdir.display(), "starting agent");
        let mut cmd = command_from_argv(&self.argv)?;
        cmd.current_dir(&request.workdir);
        let stdin = match self.prompt_via {
            PromptVia::Argv => {
                cmd.arg(&request.prompt);
                None
            }
            PromptVia::Stdin => Some(request.prompt.as_bytes()),
        };

        let output = run_command(CommandSpec {
            cmd,
            stdin,
            timeout: request.timeout,
            output_limit_bytes: self.output_limit_bytes,
            cancel: self.cancel.as_ref(),
        })?;

        Ok(AgentReply {
            exit_code: output.status.code(),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            timed_out: output.timed_out,
            cancelled: output.cancelled,
        })
    }
}

/// Why no plan came back for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentFailure {
    InvalidPrompt { error: String },
    SpawnFailed { error: String },
    TimedOut { timeout: Duration },
    Cancelled,
    NonZeroExit { exit_code: Option<i32>, stderr: String },
    /// Exit 0 with nothing but whitespace on stdout.
    EmptyOutput,
    /// Only produced with `strict_plan_format`.
    Malformed { problems: Vec<String> },
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrompt { error } => write!(f, "prompt render failed: {error}"),
            Self::SpawnFailed { error } => write!(f, "agent could not start: {error}"),
            Self::TimedOut { timeout } => {
                write!(f, "agent timed out after {}s", timeout.as_secs())
            }
            Self::Cancelled => f.write_str("agent cancelled"),
            Self::NonZeroExit { exit_code, stderr } => {
                match exit_code {
                    Some(code) => write!(f, "agent exited with status {code}")?,
                    None => f.write_str("agent killed by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::EmptyOutput => f.write_str("agent returned empty output"),
            Self::Malformed { problems } => {
                write!(f, "agent output malformed: {}", problems.join("; "))
            }
        }
    }
}

/// Settings shared by every `generate_plan` call in a cycle.
#[derive(Debug, Clone)]
pub struct PlanRequestSettings {
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub content_cap_chars: usize,
    pub strict_plan_format: bool,
}

/// Render the prompt for `item`, invoke the agent, and classify the reply.
///
/// Success requires exit code 0 and non-blank stdout; the returned plan text
/// is the trimmed stdout with a trailing newline.
#[instrument(skip_all, fields(item = %item.name))]
pub fn generate_plan<A: Agent + ?Sized>(
    agent: &A,
    item: &Item,
    settings: &PlanRequestSettings,
    date: NaiveDate,
) -> std::result::Result<String, AgentFailure> {
    let prompt = render_plan_prompt(&PlanPromptInputs {
        item_name: &item.name,
        content: &item.content,
        date,
        content_cap_chars: settings.content_cap_chars,
    })
    .map_err(|err| AgentFailure::InvalidPrompt {
        error: format!("{err:#}"),
    })?;

    let request = AgentRequest {
        item_name: item.name.clone(),
        prompt: prompt.text,
        workdir: settings.workdir.clone(),
        timeout: settings.timeout,
    };
    let reply = agent
        .invoke(&request)
        .map_err(|err| AgentFailure::SpawnFailed {
            error: format!("{err:#}"),
        })?;

    if reply.cancelled {
        return Err(AgentFailure::Cancelled);
    }
    if reply.timed_out {
        warn!(timeout_secs = settings.timeout.as_secs(), "agent timed out");
        return Err(AgentFailure::TimedOut {
            timeout: settings.timeout,
        });
    }
    if reply.exit_code != Some(0) {
        warn!(exit_code = ?reply.exit_code, "agent failed");
        return Err(AgentFailure::NonZeroExit {
            exit_code: reply.exit_code,
            stderr: reply.stderr.trim().to_string(),
        });
    }
    let body = reply.stdout.trim();
    if body.is_empty() {
        return Err(AgentFailure::EmptyOutput);
    }
    if settings.strict_plan_format {
        let problems = inspect_plan(body).problems(&item.name);
        if !problems.is_empty() {
            return Err(AgentFailure::Malformed { problems });
        }
    }

    debug!(bytes = body.len(), "agent produced plan");
    Ok(format!("{body}\n"))
}
