//! Shared types for a single orchestration cycle.
//!
//! A [`CycleResult`] is never persisted; it exists only long enough to drive
//! the archive decision and the summary line.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Whether items with a plan are moved to the archive at the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchivePolicy {
    /// Archive without asking.
    Always,
    /// Leave every item in pending.
    Never,
    /// Ask the operator (single-run mode only).
    Prompt,
}

impl ArchivePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::Prompt => "prompt",
        }
    }
}

impl fmt::Display for ArchivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchivePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "prompt" => Ok(Self::Prompt),
            other => Err(anyhow!(
                "unknown archive policy '{other}' (expected always, never or prompt)"
            )),
        }
    }
}

/// Terminal state of one pending item within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A plan already existed; the agent was not invoked.
    Skipped,
    PlanWritten { plan_key: String },
    ProcessingFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub name: String,
    pub outcome: ItemOutcome,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// Items were visited and the plan/archival steps ran.
    Completed,
    /// The pending folder was empty after the watcher ran.
    NoPendingItems,
    /// The watcher failed; nothing else ran.
    WatcherFailed,
    /// Cancellation arrived while items were being visited.
    Interrupted,
}

/// Ephemeral record of one orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResult {
    pub status: CycleStatus,
    /// Per-item outcomes in visit order.
    pub items: Vec<ItemReport>,
    /// Plan keys present after processing, sorted.
    pub plans_found: Vec<String>,
    /// Item names moved to the archive.
    pub archived: Vec<String>,
    /// `(item name, reason)` for archive moves that failed.
    pub archive_failures: Vec<(String, String)>,
    /// Plans whose item was not in pending when archiving (already archived,
    /// renamed, or deleted externally).
    pub orphan_plans: usize,
}

impl CycleResult {
    pub fn new(status: CycleStatus) -> Self {
        Self {
            status,
            items: Vec::new(),
            plans_found: Vec::new(),
            archived: Vec::new(),
            archive_failures: Vec::new(),
            orphan_plans: 0,
        }
    }

    pub fn processed(&self) -> Vec<&str> {
        self.names_where(|outcome| matches!(outcome, ItemOutcome::PlanWritten { .. }))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(|outcome| matches!(outcome, ItemOutcome::ProcessingFailed { .. }))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_where(|outcome| matches!(outcome, ItemOutcome::Skipped))
    }

    /// A cycle succeeds unless the watcher failed.
    pub fn is_success(&self) -> bool {
        self.status != CycleStatus::WatcherFailed
    }

    fn names_where(&self, pred: impl Fn(&ItemOutcome) -> bool) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| pred(&item.outcome))
            .map(|item| item.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_policy_parses_case_insensitively() {
        assert_eq!("ALWAYS".parse::<ArchivePolicy>().expect("parse"), ArchivePolicy::Always);
        assert_eq!(" never ".parse::<ArchivePolicy>().expect("parse"), ArchivePolicy::Never);
        let err = "sometimes".parse::<ArchivePolicy>().unwrap_err();
        assert!(err.to_string().contains("unknown archive policy"));
    }

    #[test]
    fn cycle_result_partitions_items_by_outcome() {
        let mut result = CycleResult::new(CycleStatus::Completed);
        result.items = vec![
            ItemReport {
                name: "A.md".to_string(),
                outcome: ItemOutcome::PlanWritten {
                    plan_key: "A_plan.md".to_string(),
                },
            },
            ItemReport {
                name: "B.md".to_string(),
                outcome: ItemOutcome::ProcessingFailed {
                    reason: "exit 1".to_string(),
                },
            },
            ItemReport {
                name: "C.md".to_string(),
                outcome: ItemOutcome::Skipped,
            },
        ];
        assert_eq!(result.processed(), vec!["A.md"]);
        assert_eq!(result.failed(), vec!["B.md"]);
        assert_eq!(result.skipped(), vec!["C.md"]);
        assert!(result.is_success());
        assert!(!CycleResult::new(CycleStatus::WatcherFailed).is_success());
    }
}
