//! Orchestrator configuration stored in `orchestrator.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::ArchivePolicy;

/// Default config file name, looked up in the vault root.
pub const CONFIG_FILE_NAME: &str = "orchestrator.toml";

/// Upper bound for `poll_interval_mins` (one week).
pub const MAX_POLL_INTERVAL_MINS: u64 = 7 * 24 * 60;
/// Upper bound for the watcher and per-item timeouts (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;
/// Upper bound for `inter_item_delay_secs` (one hour).
pub const MAX_INTER_ITEM_DELAY_SECS: u64 = 60 * 60;

/// How the rendered prompt reaches the agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVia {
    /// Appended as the final argv element.
    Argv,
    /// Written to the child's stdin.
    Stdin,
}

/// Orchestrator configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// vault layout was designed around (60s timeouts, 5 minute polling).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Vault root containing the pending/plans/archived/logs folders.
    pub vault_root: PathBuf,

    /// Upstream watcher program and arguments (e.g. `["python","gmail_watcher.py"]`).
    pub watcher_command: Vec<String>,

    /// Agent program and arguments. The prompt is appended or piped per `prompt_via`.
    pub agent_command: Vec<String>,

    pub prompt_via: PromptVia,

    /// Minutes between cycles in continuous mode.
    pub poll_interval_mins: u64,

    /// Wall-clock budget for one agent invocation.
    pub per_item_timeout_secs: u64,

    /// Wall-clock budget for the watcher.
    pub watcher_timeout_secs: u64,

    /// Pause after each agent invocation.
    pub inter_item_delay_secs: u64,

    /// Item content embedded in the prompt is cut at this many characters.
    pub content_cap_chars: usize,

    /// Stdout/stderr captured from a child beyond this many bytes is discarded.
    pub output_limit_bytes: usize,

    pub archive_policy: ArchivePolicy,

    /// Reject agent output that does not match the plan contract.
    pub strict_plan_format: bool,

    /// Only pending files with this extension are items.
    pub item_extension: String,

    pub layout: LayoutConfig,
}

/// Folder names under `vault_root`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LayoutConfig {
    pub pending: String,
    pub plans: String,
    pub archived: String,
    pub logs: String,
    /// Working directory for the watcher.
    pub scripts: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            pending: "Needs_Action".to_string(),
            plans: "Plans".to_string(),
            archived: "Done".to_string(),
            logs: "Logs".to_string(),
            scripts: "Scripts".to_string(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            vault_root: PathBuf::from("."),
            watcher_command: vec!["python".to_string(), "gmail_watcher.py".to_string()],
            agent_command: vec!["kiro".to_string()],
            prompt_via: PromptVia::Argv,
            poll_interval_mins: 5,
            per_item_timeout_secs: 60,
            watcher_timeout_secs: 60,
            inter_item_delay_secs: 2,
            content_cap_chars: 1000,
            output_limit_bytes: 1_000_000,
            archive_policy: ArchivePolicy::Prompt,
            strict_plan_format: false,
            item_extension: "md".to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.watcher_command.is_empty() || self.watcher_command[0].trim().is_empty() {
            return Err(anyhow!("watcher_command must be a non-empty array"));
        }
        if self.agent_command.is_empty() || self.agent_command[0].trim().is_empty() {
            return Err(anyhow!("agent_command must be a non-empty array"));
        }
        check_range("poll_interval_mins", self.poll_interval_mins, 1, MAX_POLL_INTERVAL_MINS)?;
        check_range(
            "per_item_timeout_secs",
            self.per_item_timeout_secs,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        check_range(
            "watcher_timeout_secs",
            self.watcher_timeout_secs,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        check_range(
            "inter_item_delay_secs",
            self.inter_item_delay_secs,
            0,
            MAX_INTER_ITEM_DELAY_SECS,
        )?;
        if self.content_cap_chars == 0 {
            return Err(anyhow!("content_cap_chars must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        let ext = self.item_extension.trim();
        if ext.is_empty() || ext.contains('.') || ext.contains('/') {
            return Err(anyhow!(
                "item_extension must be a bare extension like \"md\" (got {:?})",
                self.item_extension
            ));
        }
        self.layout.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_mins * 60)
    }

    pub fn per_item_timeout(&self) -> Duration {
        Duration::from_secs(self.per_item_timeout_secs)
    }

    pub fn watcher_timeout(&self) -> Duration {
        Duration::from_secs(self.watcher_timeout_secs)
    }

    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_secs(self.inter_item_delay_secs)
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(anyhow!("{field} must be between {min} and {max} (got {value})"));
    }
    Ok(())
}

impl LayoutConfig {
    fn validate(&self) -> Result<()> {
        let folders = [
            ("layout.pending", &self.pending),
            ("layout.plans", &self.plans),
            ("layout.archived", &self.archived),
            ("layout.logs", &self.logs),
            ("layout.scripts", &self.scripts),
        ];
        for (field, name) in folders {
            if name.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        let mut storage = vec![&self.pending, &self.plans, &self.archived];
        storage.sort();
        storage.dedup();
        if storage.len() != 3 {
            return Err(anyhow!(
                "layout.pending, layout.plans and layout.archived must be distinct folders"
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OrchestratorConfig::default()`. A relative
/// `vault_root` is resolved against the directory holding the file.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig> {
    if !path.exists() {
        let cfg = OrchestratorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut cfg: OrchestratorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    if cfg.vault_root.is_relative()
        && let Some(parent) = path.parent()
    {
        cfg.vault_root = parent.join(&cfg.vault_root);
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &OrchestratorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
