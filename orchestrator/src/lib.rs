//! Inbox-to-plan-to-done orchestrator for a document vault.
//!
//! Each cycle runs an upstream watcher, hands every pending item to an external
//! agent that writes a plan, verifies the plans, and optionally archives the
//! items that have one. The crate keeps the same split the cycle relies on:
//!
//! - **[`core`]**: Pure rules (plan naming, truncation, plan inspection, cycle
//!   result types). No I/O.
//! - **[`io`]**: Filesystem, subprocess, console and config adapters. The
//!   watcher, agent and reporter sit behind traits so tests can script them.
//!
//! [`cycle`] drives a single pass and [`looping`] repeats it on an interval
//! until cancelled.

pub mod cancel;
pub mod core;
pub mod cycle;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
