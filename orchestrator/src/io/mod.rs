//! I/O adapters for orchestrator commands.

pub mod agent;
pub mod config;
pub mod confirm;
pub mod item_store;
pub mod layout;
pub mod process;
pub mod prompt;
pub mod reporter;
pub mod watcher;
