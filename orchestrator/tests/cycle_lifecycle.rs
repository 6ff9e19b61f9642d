//! Cycle-level harness tests for full orchestration scenarios.
//!
//! These drive `run_cycle` against a temporary vault with scripted watcher,
//! agent and confirmation doubles, and check what ends up on disk.

use std::fs;
use std::time::Duration;

use orchestrator::cancel::CancelFlag;
use orchestrator::core::types::{ArchivePolicy, CycleResult, CycleStatus, ItemOutcome};
use orchestrator::cycle::{CycleContext, CycleSettings, run_cycle};
use orchestrator::io::agent::AgentReply;
use orchestrator::io::watcher::WatcherOutcome;
use orchestrator::test_support::{
    FixedClock, MemoryReporter, ScriptedAgent, ScriptedConfirm, ScriptedWatcher, TestVault,
    plan_text,
};

struct Doubles {
    watcher: ScriptedWatcher,
    agent: ScriptedAgent,
    confirm: ScriptedConfirm,
    reporter: MemoryReporter,
}

impl Doubles {
    fn new(agent: ScriptedAgent) -> Self {
        Self {
            watcher: ScriptedWatcher::always(WatcherOutcome::Completed),
            agent,
            confirm: ScriptedConfirm::answer(true),
            reporter: MemoryReporter::default(),
        }
    }
}

fn run(vault: &TestVault, doubles: &Doubles, policy: ArchivePolicy) -> CycleResult {
    let store = vault.store();
    let clock = FixedClock::at("2024-05-01 09:00:00");
    let cancel = CancelFlag::new();
    let ctx = CycleContext {
        store: &store,
        watcher: &doubles.watcher,
        agent: &doubles.agent,
        reporter: &doubles.reporter,
        confirm: &doubles.confirm,
        clock: &clock,
        cancel: &cancel,
    };
    let settings = CycleSettings {
        archive_policy: policy,
        inter_item_delay: Duration::ZERO,
        ..CycleSettings::from_config(&vault.config())
    };
    run_cycle(&ctx, &settings).expect("cycle")
}

/// A succeeds, B exits 1, C already has a plan.
///
/// Expected: A_plan.md written, no B plan, agent never asked about C, and
/// archiving moves A and C (both planned) while B stays pending.
#[test]
fn mixed_batch_plans_skips_and_archives_only_planned_items() {
    let vault = TestVault::new().expect("vault");
    vault.add_pending("A.md", "pay the invoice").expect("add A");
    vault.add_pending("B.md", "call back").expect("add B");
    vault.add_pending("C.md", "old news").expect("add C");
    vault.add_plan("C_plan.md", &plan_text("C.md")).expect("plan C");

    let doubles = Doubles::new(ScriptedAgent::per_item(vec![
        ("A.md", AgentReply::ok(plan_text("A.md"))),
        ("B.md", AgentReply::exit(1, "rate limited")),
        ("C.md", AgentReply::ok("must not be used")),
    ]));

    let result = run(&vault, &doubles, ArchivePolicy::Prompt);

    assert_eq!(result.status, CycleStatus::Completed);
    assert_eq!(result.processed(), vec!["A.md"]);
    assert_eq!(result.failed(), vec!["B.md"]);
    assert_eq!(result.skipped(), vec!["C.md"]);
    assert_eq!(doubles.agent.invoked_items(), vec!["A.md", "B.md"]);
    assert_eq!(doubles.confirm.asked(), 1);

    assert_eq!(vault.plan_names(), vec!["A_plan.md", "C_plan.md"]);
    assert_eq!(vault.pending_names(), vec!["B.md"]);
    assert_eq!(vault.archived_names(), vec!["A.md", "C.md"]);
    assert_eq!(
        fs::read_to_string(vault.paths().plans_dir.join("A_plan.md")).expect("read"),
        plan_text("A.md")
    );
    assert!(
        doubles
            .reporter
            .contains("Failed: B.md: agent exited with status 1: rate limited")
    );
    assert!(
        doubles
            .reporter
            .contains("Summary: status=completed processed=1 failed=1 skipped=1")
    );
}

/// Two consecutive cycles without new items: the second invokes the agent
/// zero times and leaves plans byte-identical.
#[test]
fn second_cycle_is_idempotent() {
    let vault = TestVault::new().expect("vault");
    vault.add_pending("A.md", "x").expect("add");
    vault.add_pending("B.md", "y").expect("add");
    let doubles = Doubles::new(ScriptedAgent::per_item(vec![
        ("A.md", AgentReply::ok(plan_text("A.md"))),
        ("B.md", AgentReply::ok(plan_text("B.md"))),
    ]));

    run(&vault, &doubles, ArchivePolicy::Never);
    let before = fs::read(vault.paths().plans_dir.join("A_plan.md")).expect("read");
    let second = run(&vault, &doubles, ArchivePolicy::Never);

    assert_eq!(doubles.agent.requests().len(), 2);
    assert_eq!(second.skipped(), vec!["A.md", "B.md"]);
    assert!(second.processed().is_empty());
    assert_eq!(
        fs::read(vault.paths().plans_dir.join("A_plan.md")).expect("read"),
        before
    );
}

/// Failure of the k-th item does not change the outcome of any other item.
#[test]
fn one_failing_item_does_not_affect_its_neighbours() {
    let vault = TestVault::new().expect("vault");
    for name in ["a.md", "b.md", "c.md", "d.md"] {
        vault.add_pending(name, name).expect("add");
    }
    let doubles = Doubles::new(ScriptedAgent::new(vec![
        Ok(AgentReply::ok(plan_text("a.md"))),
        Ok(AgentReply::timed_out()),
        Err(anyhow::anyhow!("spawn agent: not found")),
        Ok(AgentReply::ok(plan_text("d.md"))),
    ]));

    let result = run(&vault, &doubles, ArchivePolicy::Never);

    let outcomes: Vec<(&str, bool)> = result
        .items
        .iter()
        .map(|r| {
            (
                r.name.as_str(),
                matches!(r.outcome, ItemOutcome::PlanWritten { .. }),
            )
        })
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("a.md", true),
            ("b.md", false),
            ("c.md", false),
            ("d.md", true)
        ]
    );
    assert_eq!(vault.plan_names(), vec!["a_plan.md", "d_plan.md"]);
    assert_eq!(vault.pending_names().len(), 4);
}

/// Empty pending: no agent call, no archive prompt, successful status.
#[test]
fn empty_pending_never_prompts() {
    let vault = TestVault::new().expect("vault");
    vault.add_plan("old_plan.md", &plan_text("old.md")).expect("plan");
    let doubles = Doubles::new(ScriptedAgent::per_item(Vec::new()));

    let result = run(&vault, &doubles, ArchivePolicy::Prompt);

    assert_eq!(result.status, CycleStatus::NoPendingItems);
    assert_eq!(doubles.confirm.asked(), 0);
    assert!(doubles.agent.requests().is_empty());
    assert_eq!(vault.plan_names(), vec!["old_plan.md"]);
}

/// The watcher failing aborts the cycle before any agent call.
#[test]
fn watcher_failure_aborts_cycle() {
    let vault = TestVault::new().expect("vault");
    vault.add_pending("A.md", "x").expect("add");
    let mut doubles = Doubles::new(ScriptedAgent::per_item(vec![(
        "A.md",
        AgentReply::ok(plan_text("A.md")),
    )]));
    doubles.watcher = ScriptedWatcher::new(vec![WatcherOutcome::Failed {
        exit_code: Some(1),
        stderr: "token expired".to_string(),
    }]);

    let result = run(&vault, &doubles, ArchivePolicy::Always);

    assert_eq!(result.status, CycleStatus::WatcherFailed);
    assert!(!result.is_success());
    assert_eq!(doubles.watcher.calls(), 1);
    assert!(doubles.agent.requests().is_empty());
    assert!(vault.plan_names().is_empty());
    assert!(
        doubles
            .reporter
            .contains("Watcher error: exit 1: token expired")
    );
}

/// An item whose archive move fails stays in pending only; the others move.
#[test]
fn archive_failure_keeps_item_in_exactly_one_place() {
    let vault = TestVault::new().expect("vault");
    vault.add_pending("A.md", "new").expect("add");
    vault.add_pending("B.md", "y").expect("add");
    vault.add_plan("A_plan.md", &plan_text("A.md")).expect("plan");
    vault.add_plan("B_plan.md", &plan_text("B.md")).expect("plan");
    fs::write(vault.paths().archived_dir.join("A.md"), "old").expect("occupy");
    let doubles = Doubles::new(ScriptedAgent::per_item(Vec::new()));

    let result = run(&vault, &doubles, ArchivePolicy::Always);

    assert_eq!(result.archived, vec!["B.md".to_string()]);
    assert_eq!(result.archive_failures.len(), 1);
    assert_eq!(result.archive_failures[0].0, "A.md");
    assert_eq!(vault.pending_names(), vec!["A.md"]);
    assert_eq!(
        fs::read_to_string(vault.paths().pending_dir.join("A.md")).expect("read"),
        "new"
    );
    assert!(doubles.reporter.contains("Total moved to archive: 1"));
}

/// Without an answer on stdin the prompt policy archives nothing.
#[test]
fn unanswerable_prompt_archives_nothing() {
    let vault = TestVault::new().expect("vault");
    vault.add_pending("A.md", "x").expect("add");
    let mut doubles = Doubles::new(ScriptedAgent::per_item(vec![(
        "A.md",
        AgentReply::ok(plan_text("A.md")),
    )]));
    doubles.confirm = ScriptedConfirm::failing();

    let result = run(&vault, &doubles, ArchivePolicy::Prompt);

    assert!(result.archived.is_empty());
    assert_eq!(vault.pending_names(), vec!["A.md"]);
    assert!(vault.archived_names().is_empty());
}
