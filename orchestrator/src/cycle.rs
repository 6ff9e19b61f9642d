//! Orchestration for a single watch → plan → verify → archive cycle.
//!
//! Per item: `Pending → Skipped | Processing → PlanWritten | ProcessingFailed`.
//! A failing item never stops the batch; only a failed watcher aborts the cycle.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::core::naming::plan_key;
use crate::core::plan_format::inspect_plan;
use crate::core::types::{ArchivePolicy, CycleResult, CycleStatus, ItemOutcome, ItemReport};
use crate::io::agent::{Agent, PlanRequestSettings, generate_plan};
use crate::io::config::OrchestratorConfig;
use crate::io::confirm::Confirm;
use crate::io::item_store::{Item, ItemStore, Plan};
use crate::io::reporter::{Clock, Reporter};
use crate::io::watcher::{Watcher, WatcherOutcome, run_watcher};

const BANNER: &str = "============================================================";

/// Tunables for one cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub plan_request: PlanRequestSettings,
    /// Pause after each agent invocation, the last one included (not after skipped items).
    pub inter_item_delay: Duration,
    pub archive_policy: ArchivePolicy,
    /// Plans listed individually in the verification step.
    pub preview_limit: usize,
}

impl CycleSettings {
    pub fn from_config(cfg: &OrchestratorConfig) -> Self {
        Self {
            plan_request: PlanRequestSettings {
                workdir: cfg.vault_root.clone(),
                timeout: cfg.per_item_timeout(),
                content_cap_chars: cfg.content_cap_chars,
                strict_plan_format: cfg.strict_plan_format,
            },
            inter_item_delay: cfg.inter_item_delay(),
            archive_policy: cfg.archive_policy,
            preview_limit: 5,
        }
    }
}

/// Collaborators a cycle runs against.
pub struct CycleContext<'a> {
    pub store: &'a ItemStore,
    pub watcher: &'a dyn Watcher,
    pub agent: &'a dyn Agent,
    pub reporter: &'a dyn Reporter,
    pub confirm: &'a dyn Confirm,
    pub clock: &'a dyn Clock,
    pub cancel: &'a CancelFlag,
}

/// Run one full cycle, bracketed by banner lines.
///
/// Returns `Err` only when a folder cannot be listed; every item-level and
/// watcher failure is reported and folded into the [`CycleResult`].
#[instrument(skip_all, fields(archive_policy = %settings.archive_policy))]
pub fn run_cycle(ctx: &CycleContext<'_>, settings: &CycleSettings) -> Result<CycleResult> {
    let r = ctx.reporter;
    r.emit(BANNER);
    r.emit("STARTING CYCLE");
    r.emit(BANNER);

    let result = run_cycle_inner(ctx, settings);

    match &result {
        Ok(res) => {
            r.emit(&summary_line(res));
            r.emit(BANNER);
            r.emit(match res.status {
                CycleStatus::Interrupted => "CYCLE INTERRUPTED",
                _ if res.is_success() => "CYCLE COMPLETE",
                _ => "CYCLE ABORTED",
            });
        }
        Err(err) => {
            r.emit(&format!("Cycle failed: {err:#}"));
            r.emit(BANNER);
            r.emit("CYCLE ABORTED");
        }
    }
    r.emit(BANNER);
    result
}

fn run_cycle_inner(ctx: &CycleContext<'_>, settings: &CycleSettings) -> Result<CycleResult> {
    let r = ctx.reporter;

    let watcher_outcome = run_watcher(ctx.watcher, r);
    if !watcher_outcome.is_success() {
        if watcher_outcome == WatcherOutcome::Cancelled || ctx.cancel.is_cancelled() {
            r.emit("Cycle interrupted during watcher run, nothing processed");
            return Ok(CycleResult::new(CycleStatus::Interrupted));
        }
        r.emit("Cycle aborted: watcher failed, nothing processed");
        return Ok(CycleResult::new(CycleStatus::WatcherFailed));
    }

    let items = ctx.store.list_pending().context("list pending items")?;
    r.emit(&format!("Items in pending: {}", items.len()));
    if items.is_empty() {
        r.emit("No items to process");
        return Ok(CycleResult::new(CycleStatus::NoPendingItems));
    }

    let mut result = CycleResult::new(CycleStatus::Completed);
    process_items(ctx, settings, &items, &mut result);
    if result.status == CycleStatus::Interrupted {
        r.emit("Archiving skipped: cycle interrupted");
        return Ok(result);
    }

    let plans = ctx.store.list_plans().context("list plans")?;
    report_plans(r, &plans, settings.preview_limit);
    result.plans_found = plans.iter().map(|p| p.key.clone()).collect();

    if plans.is_empty() {
        return Ok(result);
    }
    match archive_decision(ctx, settings.archive_policy, plans.len()) {
        ArchiveDecision::Archive => archive_planned(ctx, &plans, &mut result),
        ArchiveDecision::Keep => {}
        ArchiveDecision::Interrupted => {
            r.emit("Archiving skipped: cycle interrupted");
            result.status = CycleStatus::Interrupted;
        }
    }
    Ok(result)
}

fn process_items(
    ctx: &CycleContext<'_>,
    settings: &CycleSettings,
    items: &[Item],
    result: &mut CycleResult,
) {
    let r = ctx.reporter;
    r.emit(&format!("Processing {} items...", items.len()));
    let date = ctx.clock.now().date();

    for (idx, item) in items.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            r.emit(&format!(
                "Cancellation requested, {} items left unvisited",
                items.len() - idx
            ));
            result.status = CycleStatus::Interrupted;
            return;
        }

        let outcome = process_item(ctx, settings, item, date);
        let invoked_agent = outcome != ItemOutcome::Skipped;
        result.items.push(ItemReport {
            name: item.name.clone(),
            outcome,
        });

        if invoked_agent && !settings.inter_item_delay.is_zero() {
            debug!(delay_ms = settings.inter_item_delay.as_millis() as u64, "inter-item delay");
            ctx.cancel.sleep(settings.inter_item_delay);
        }
    }

    // Cancellation that landed during the final item or its delay.
    if ctx.cancel.is_cancelled() {
        r.emit("Cancellation requested, stopping after the last visited item");
        result.status = CycleStatus::Interrupted;
    }
}

#[instrument(skip_all, fields(item = %item.name))]
fn process_item(
    ctx: &CycleContext<'_>,
    settings: &CycleSettings,
    item: &Item,
    date: NaiveDate,
) -> ItemOutcome {
    let r = ctx.reporter;
    if ctx.store.plan_exists(item) {
        r.emit(&format!("Skipped: {} (plan already exists)", item.name));
        return ItemOutcome::Skipped;
    }

    r.emit(&format!(
        "Processing: {} ({} bytes)",
        item.name, item.size_bytes
    ));
    let text = match generate_plan(ctx.agent, item, &settings.plan_request, date) {
        Ok(text) => text,
        Err(failure) => {
            warn!(reason = %failure, "item failed");
            r.emit(&format!("Failed: {}: {failure}", item.name));
            return ItemOutcome::ProcessingFailed {
                reason: failure.to_string(),
            };
        }
    };

    match ctx.store.write_plan(item, &text) {
        Ok(_) => {
            let key = plan_key(&item.name);
            info!(plan = %key, "plan written");
            r.emit(&format!("Plan written: {key}"));
            ItemOutcome::PlanWritten { plan_key: key }
        }
        Err(err) => {
            r.emit(&format!("Plan write failed for {}: {err:#}", item.name));
            ItemOutcome::ProcessingFailed {
                reason: format!("{err:#}"),
            }
        }
    }
}

fn report_plans(r: &dyn Reporter, plans: &[Plan], preview_limit: usize) {
    r.emit(&format!("Plans found: {}", plans.len()));
    if plans.is_empty() {
        return;
    }
    r.emit("Plan files:");
    for plan in plans.iter().take(preview_limit) {
        r.emit(&format!("   - {} ({} bytes)", plan.key, plan.size_bytes));
        if let Some(item_name) = plan.item_name() {
            let problems = inspect_plan(&plan.body).problems(&item_name);
            if !problems.is_empty() {
                r.emit(&format!("     warning: {}", problems.join("; ")));
            }
        }
    }
    if plans.len() > preview_limit {
        r.emit(&format!("   ... and {} more", plans.len() - preview_limit));
    }
}

enum ArchiveDecision {
    Archive,
    Keep,
    Interrupted,
}

/// Apply the archive policy. A cancellation before or during the question wins
/// over any answer.
fn archive_decision(
    ctx: &CycleContext<'_>,
    policy: ArchivePolicy,
    plan_count: usize,
) -> ArchiveDecision {
    let r = ctx.reporter;
    if ctx.cancel.is_cancelled() {
        return ArchiveDecision::Interrupted;
    }
    match policy {
        ArchivePolicy::Always => ArchiveDecision::Archive,
        ArchivePolicy::Never => {
            r.emit("Archiving skipped (policy: never)");
            ArchiveDecision::Keep
        }
        ArchivePolicy::Prompt => {
            r.emit(&format!("{plan_count} plans available"));
            let answer = ctx.confirm.confirm("Move processed items to the archive?");
            if ctx.cancel.is_cancelled() {
                return ArchiveDecision::Interrupted;
            }
            match answer {
                Ok(true) => ArchiveDecision::Archive,
                Ok(false) => {
                    r.emit("Archiving declined");
                    ArchiveDecision::Keep
                }
                Err(err) => {
                    r.emit(&format!("Archiving skipped: no answer ({err:#})"));
                    ArchiveDecision::Keep
                }
            }
        }
    }
}

/// Archive every pending item that has a plan. Plans without a pending item
/// are counted, not reported as errors.
fn archive_planned(ctx: &CycleContext<'_>, plans: &[Plan], result: &mut CycleResult) {
    let r = ctx.reporter;
    r.emit("Moving processed items...");
    for plan in plans {
        let Some(item_name) = plan.item_name() else {
            continue;
        };
        if !ctx.store.is_pending(&item_name) {
            debug!(plan = %plan.key, "no pending item for plan");
            result.orphan_plans += 1;
            continue;
        }
        match ctx.store.archive(&item_name) {
            Ok(_) => {
                r.emit(&format!("Moved: {item_name} -> archive"));
                result.archived.push(item_name);
            }
            Err(err) => {
                r.emit(&format!("Archive failed for {item_name}: {err:#}"));
                result.archive_failures.push((item_name, format!("{err:#}")));
            }
        }
    }
    r.emit(&format!("Total moved to archive: {}", result.archived.len()));
}

fn summary_line(result: &CycleResult) -> String {
    format!(
        "Summary: status={} processed={} failed={} skipped={} plans={} archived={} orphan_plans={}",
        status_label(result.status),
        result.processed().len(),
        result.failed().len(),
        result.skipped().len(),
        result.plans_found.len(),
        result.archived.len(),
        result.orphan_plans,
    )
}

fn status_label(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Completed => "completed",
        CycleStatus::NoPendingItems => "no_pending_items",
        CycleStatus::WatcherFailed => "watcher_failed",
        CycleStatus::Interrupted => "interrupted",
    }
}
