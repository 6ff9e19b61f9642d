//! Continuous mode: run a cycle, wait, repeat until cancelled.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::types::{CycleResult, CycleStatus};
use crate::cycle::{CycleContext, CycleSettings, run_cycle};

/// Reason why `run_continuous` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// Cancellation was requested.
    Interrupted,
    /// `max_cycles` cycles ran.
    MaxCycles,
}

/// Summary of a continuous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub cycles: u32,
    pub stop: LoopStop,
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Idle time between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until cancelled.
    pub max_cycles: Option<u32>,
}

/// Run cycles back to back with `interval` of idle time between them.
///
/// A cycle that returns `Err` is reported and the loop carries on; only
/// cancellation or `max_cycles` ends it. The idle wait wakes early on cancel.
pub fn run_continuous<F: FnMut(&CycleResult)>(
    ctx: &CycleContext<'_>,
    cycle_settings: &CycleSettings,
    loop_settings: &LoopSettings,
    mut on_cycle: F,
) -> Result<LoopOutcome> {
    let r = ctx.reporter;
    let minutes = loop_settings.interval.as_secs() / 60;
    r.emit(&format!("Continuous mode: every {minutes} minutes"));
    r.emit("Press Ctrl+C to stop");

    let mut cycles = 0u32;
    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(stopped(ctx, cycles));
        }

        match run_cycle(ctx, cycle_settings) {
            Ok(result) => {
                on_cycle(&result);
                if result.status == CycleStatus::Interrupted {
                    cycles += 1;
                    return Ok(stopped(ctx, cycles));
                }
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "cycle failed, continuing");
                r.emit(&format!("Cycle error: {err:#}"));
            }
        }
        cycles += 1;

        if loop_settings.max_cycles.is_some_and(|max| cycles >= max) {
            info!(cycles, "max cycles reached");
            return Ok(LoopOutcome {
                cycles,
                stop: LoopStop::MaxCycles,
            });
        }

        r.emit(&format!("Waiting {minutes} minutes..."));
        if !ctx.cancel.sleep(loop_settings.interval) {
            return Ok(stopped(ctx, cycles));
        }
    }
}

fn stopped(ctx: &CycleContext<'_>, cycles: u32) -> LoopOutcome {
    ctx.reporter.emit("Stopped by user");
    LoopOutcome {
        cycles,
        stop: LoopStop::Interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelFlag;
    use crate::core::types::ArchivePolicy;
    use crate::io::agent::AgentReply;
    use crate::io::watcher::WatcherOutcome;
    use crate::test_support::{
        FixedClock, MemoryReporter, ScriptedAgent, ScriptedConfirm, ScriptedWatcher, TestVault,
        plan_text,
    };

    fn settings(vault: &TestVault) -> CycleSettings {
        CycleSettings {
            archive_policy: ArchivePolicy::Never,
            inter_item_delay: Duration::ZERO,
            ..CycleSettings::from_config(&vault.config())
        }
    }

    #[test]
    fn runs_until_max_cycles_and_keeps_going_after_watcher_failure() {
        let vault = TestVault::new().expect("vault");
        vault.add_pending("A.md", "x").expect("add");
        let store = vault.store();
        let watcher = ScriptedWatcher::new(vec![
            WatcherOutcome::Failed {
                exit_code: Some(1),
                stderr: String::new(),
            },
            WatcherOutcome::Completed,
            WatcherOutcome::Completed,
        ]);
        let agent = ScriptedAgent::per_item(vec![("A.md", AgentReply::ok(plan_text("A.md")))]);
        let reporter = MemoryReporter::default();
        let cancel = CancelFlag::new();
        let ctx = CycleContext {
            store: &store,
            watcher: &watcher,
            agent: &agent,
            reporter: &reporter,
            confirm: &ScriptedConfirm::answer(false),
            clock: &FixedClock::at("2024-05-01 09:00:00"),
            cancel: &cancel,
        };

        let mut statuses = Vec::new();
        let outcome = run_continuous(
            &ctx,
            &settings(&vault),
            &LoopSettings {
                interval: Duration::ZERO,
                max_cycles: Some(3),
            },
            |result| statuses.push(result.status),
        )
        .expect("loop");

        assert_eq!(
            outcome,
            LoopOutcome {
                cycles: 3,
                stop: LoopStop::MaxCycles
            }
        );
        assert_eq!(
            statuses,
            vec![
                CycleStatus::WatcherFailed,
                CycleStatus::Completed,
                CycleStatus::Completed
            ]
        );
        // Second cycle wrote the plan; the third skipped it.
        assert_eq!(agent.requests().len(), 1);
        assert!(reporter.contains("Continuous mode: every 0 minutes"));
    }

    #[test]
    fn cancel_during_wait_stops_after_current_cycle() {
        let vault = TestVault::new().expect("vault");
        let store = vault.store();
        let watcher = ScriptedWatcher::always(WatcherOutcome::Completed);
        let agent = ScriptedAgent::per_item(Vec::new());
        let reporter = MemoryReporter::default();
        let cancel = CancelFlag::new();
        let ctx = CycleContext {
            store: &store,
            watcher: &watcher,
            agent: &agent,
            reporter: &reporter,
            confirm: &ScriptedConfirm::answer(false),
            clock: &FixedClock::at("2024-05-01 09:00:00"),
            cancel: &cancel,
        };

        let remote = cancel.clone();
        let outcome = run_continuous(
            &ctx,
            &settings(&vault),
            &LoopSettings {
                interval: Duration::from_secs(300),
                max_cycles: None,
            },
            |_| remote.cancel(),
        )
        .expect("loop");

        assert_eq!(
            outcome,
            LoopOutcome {
                cycles: 1,
                stop: LoopStop::Interrupted
            }
        );
        assert!(reporter.contains("Waiting 5 minutes..."));
        assert_eq!(reporter.lines().last().map(String::as_str), Some("Stopped by user"));
    }
}
