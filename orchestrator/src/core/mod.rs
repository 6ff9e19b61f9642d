//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on names and
//! in-memory text and return deterministic outputs suitable for tests.

pub mod naming;
pub mod plan_format;
pub mod truncate;
pub mod types;
