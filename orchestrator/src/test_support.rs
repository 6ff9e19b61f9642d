//! Test-only doubles for the cycle's collaborators and a throwaway vault.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use tempfile::TempDir;

use crate::cancel::CancelFlag;
use crate::io::agent::{Agent, AgentReply, AgentRequest};
use crate::io::config::OrchestratorConfig;
use crate::io::confirm::Confirm;
use crate::io::item_store::{Item, ItemStore};
use crate::io::layout::VaultPaths;
use crate::io::reporter::{Clock, Reporter};
use crate::io::watcher::{Watcher, WatcherOutcome};

/// Construct an in-memory item.
pub fn item(name: &str, content: &str) -> Item {
    Item {
        name: name.to_string(),
        content: content.to_string(),
        size_bytes: content.len() as u64,
    }
}

/// A plan body that satisfies the plan contract for `item_name`.
pub fn plan_text(item_name: &str) -> String {
    format!(
        "# EMAIL PLAN: {item_name}\n\n## Summary\nNeeds a reply\n\n## Action Items\n- [ ] Read full email\n- [ ] Take necessary action\n- [ ] Mark as done\n\n## Priority\nMedium\n\n## Notes\nNone\n"
    )
}

/// Clock pinned to a settable instant. Clones share the instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl FixedClock {
    /// `at("2024-03-09 14:05:01")`. Panics on a malformed timestamp.
    pub fn at(timestamp: &str) -> Self {
        Self {
            now: Rc::new(Cell::new(parse_timestamp(timestamp))),
        }
    }

    pub fn set(&self, timestamp: &str) {
        self.now.set(parse_timestamp(timestamp));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

fn parse_timestamp(timestamp: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|err| panic!("bad test timestamp {timestamp:?}: {err}"))
}

/// Reporter that keeps emitted lines in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: RefCell<Vec<String>>,
}

impl MemoryReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// True if any emitted line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|line| line.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn emit(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }
}

/// Watcher returning queued outcomes in order, then a fallback.
pub struct ScriptedWatcher {
    queue: RefCell<VecDeque<WatcherOutcome>>,
    fallback: Option<WatcherOutcome>,
    calls: Cell<usize>,
}

impl ScriptedWatcher {
    /// Returns `outcomes` once each; an exhausted queue reports a spawn failure.
    pub fn new(outcomes: Vec<WatcherOutcome>) -> Self {
        Self {
            queue: RefCell::new(outcomes.into()),
            fallback: None,
            calls: Cell::new(0),
        }
    }

    /// Returns `outcome` on every call.
    pub fn always(outcome: WatcherOutcome) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            fallback: Some(outcome),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Watcher for ScriptedWatcher {
    fn run(&self) -> WatcherOutcome {
        self.calls.set(self.calls.get() + 1);
        if let Some(outcome) = self.queue.borrow_mut().pop_front() {
            return outcome;
        }
        self.fallback
            .clone()
            .unwrap_or_else(|| WatcherOutcome::SpawnFailed {
                error: "scripted watcher exhausted".to_string(),
            })
    }
}

enum AgentScript {
    Queue(RefCell<VecDeque<Result<AgentReply>>>),
    PerItem(HashMap<String, AgentReply>),
}

/// Agent double that records every request it receives.
pub struct ScriptedAgent {
    script: AgentScript,
    requests: RefCell<Vec<AgentRequest>>,
    cancel_on: Option<(String, CancelFlag)>,
}

impl ScriptedAgent {
    /// Replies in call order; an exhausted queue returns `Err`.
    pub fn new(replies: Vec<Result<AgentReply>>) -> Self {
        Self {
            script: AgentScript::Queue(RefCell::new(replies.into())),
            requests: RefCell::new(Vec::new()),
            cancel_on: None,
        }
    }

    /// Replies keyed by item name, reusable across cycles. Unknown items get `Err`.
    pub fn per_item(replies: Vec<(&str, AgentReply)>) -> Self {
        Self {
            script: AgentScript::PerItem(
                replies
                    .into_iter()
                    .map(|(name, reply)| (name.to_string(), reply))
                    .collect(),
            ),
            requests: RefCell::new(Vec::new()),
            cancel_on: None,
        }
    }

    /// When invoked for `item_name`, flip `flag` and reply as a killed child would.
    pub fn cancel_on(mut self, item_name: &str, flag: &CancelFlag) -> Self {
        self.cancel_on = Some((item_name.to_string(), flag.clone()));
        self
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.borrow().clone()
    }

    /// Item names in invocation order.
    pub fn invoked_items(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.item_name.clone())
            .collect()
    }
}

impl Agent for ScriptedAgent {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentReply> {
        self.requests.borrow_mut().push(request.clone());
        if let Some((name, flag)) = &self.cancel_on
            && *name == request.item_name
        {
            flag.cancel();
            return Ok(AgentReply {
                exit_code: None,
                cancelled: true,
                ..AgentReply::exit(0, "")
            });
        }
        match &self.script {
            AgentScript::Queue(queue) => queue
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("scripted agent exhausted"))),
            AgentScript::PerItem(replies) => replies
                .get(&request.item_name)
                .cloned()
                .ok_or_else(|| anyhow!("no scripted reply for {}", request.item_name)),
        }
    }
}

/// Confirmation double with a fixed answer.
pub struct ScriptedConfirm {
    answer: Option<bool>,
    asked: Cell<usize>,
    cancel_on_ask: Option<CancelFlag>,
}

impl ScriptedConfirm {
    pub fn answer(answer: bool) -> Self {
        Self {
            answer: Some(answer),
            asked: Cell::new(0),
            cancel_on_ask: None,
        }
    }

    /// Every question fails as if stdin were unreadable.
    pub fn failing() -> Self {
        Self {
            answer: None,
            asked: Cell::new(0),
            cancel_on_ask: None,
        }
    }

    /// Flip `flag` while the question is open, as Ctrl+C at the prompt would.
    pub fn cancel_on_ask(mut self, flag: &CancelFlag) -> Self {
        self.cancel_on_ask = Some(flag.clone());
        self
    }

    pub fn asked(&self) -> usize {
        self.asked.get()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, _question: &str) -> Result<bool> {
        self.asked.set(self.asked.get() + 1);
        if let Some(flag) = &self.cancel_on_ask {
            flag.cancel();
        }
        self.answer.ok_or_else(|| anyhow!("stdin closed"))
    }
}

/// Temporary vault with every default folder created.
pub struct TestVault {
    _temp: TempDir,
    config: OrchestratorConfig,
    paths: VaultPaths,
}

impl TestVault {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let config = OrchestratorConfig {
            vault_root: temp.path().to_path_buf(),
            ..OrchestratorConfig::default()
        };
        let paths = VaultPaths::from_config(&config);
        for dir in [
            &paths.pending_dir,
            &paths.plans_dir,
            &paths.archived_dir,
            &paths.logs_dir,
            &paths.scripts_dir,
        ] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(Self {
            _temp: temp,
            config,
            paths,
        })
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    /// Config rooted at this vault with default settings.
    pub fn config(&self) -> OrchestratorConfig {
        self.config.clone()
    }

    pub fn store(&self) -> ItemStore {
        ItemStore::new(&self.paths, self.config.item_extension.clone())
    }

    pub fn add_pending(&self, name: &str, content: &str) -> Result<()> {
        let path = self.paths.pending_dir.join(name);
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))
    }

    pub fn add_plan(&self, key: &str, body: &str) -> Result<()> {
        let path = self.paths.plans_dir.join(key);
        fs::write(&path, body).with_context(|| format!("write {}", path.display()))
    }

    pub fn pending_names(&self) -> Vec<String> {
        sorted_names(&self.paths.pending_dir)
    }

    pub fn plan_names(&self) -> Vec<String> {
        sorted_names(&self.paths.plans_dir)
    }

    pub fn archived_names(&self) -> Vec<String> {
        sorted_names(&self.paths.archived_dir)
    }
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
