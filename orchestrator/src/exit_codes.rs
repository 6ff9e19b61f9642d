//! Stable exit codes for orchestrator CLI commands.

/// Command succeeded (an empty pending folder is still a success).
pub const OK: i32 = 0;
/// Startup failed: invalid config, missing vault layout, or other errors.
pub const INVALID: i32 = 1;
/// `orchestrator once` aborted the cycle because the watcher failed.
pub const WATCHER_FAILED: i32 = 2;
/// The run was stopped by Ctrl+C.
pub const INTERRUPTED: i32 = 130;
