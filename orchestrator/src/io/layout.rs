//! Canonical vault folder paths and `orchestrator init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{CONFIG_FILE_NAME, LayoutConfig, OrchestratorConfig, write_config};

/// All folders a cycle reads or writes, resolved against the vault root.
#[derive(Debug, Clone)]
pub struct VaultPaths {
    pub root: PathBuf,
    pub pending_dir: PathBuf,
    pub plans_dir: PathBuf,
    pub archived_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub scripts_dir: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl Into<PathBuf>, layout: &LayoutConfig) -> Self {
        let root = root.into();
        Self {
            pending_dir: root.join(&layout.pending),
            plans_dir: root.join(&layout.plans),
            archived_dir: root.join(&layout.archived),
            logs_dir: root.join(&layout.logs),
            scripts_dir: root.join(&layout.scripts),
            root,
        }
    }

    pub fn from_config(cfg: &OrchestratorConfig) -> Self {
        Self::new(&cfg.vault_root, &cfg.layout)
    }

    /// Folders that must exist before any cycle starts.
    fn required(&self) -> [(&'static str, &Path); 4] {
        [
            ("pending", self.pending_dir.as_path()),
            ("plans", self.plans_dir.as_path()),
            ("archived", self.archived_dir.as_path()),
            ("logs", self.logs_dir.as_path()),
        ]
    }

    /// Fail with every missing location listed; a cycle never creates them.
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(anyhow!(
                "vault root {} does not exist (run `orchestrator init`)",
                self.root.display()
            ));
        }
        let missing: Vec<String> = self
            .required()
            .iter()
            .filter(|(_, path)| !path.is_dir())
            .map(|(role, path)| format!("{role} ({})", path.display()))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!(
                "vault layout incomplete, missing: {} (run `orchestrator init`)",
                missing.join(", ")
            ));
        }
        Ok(())
    }
}

/// Options for `init_vault`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing `orchestrator.toml`.
    pub force: bool,
}

/// Create the vault folders and a default config in `cfg.vault_root`.
///
/// Existing folders are kept. Fails if the config file already exists unless
/// `options.force` is set.
pub fn init_vault(cfg: &OrchestratorConfig, options: &InitOptions) -> Result<VaultPaths> {
    let paths = VaultPaths::from_config(cfg);
    let config_path = paths.root.join(CONFIG_FILE_NAME);
    if config_path.exists() && !options.force {
        return Err(anyhow!(
            "orchestrator init: {} already exists (use --force to overwrite)",
            config_path.display()
        ));
    }

    for dir in [
        &paths.root,
        &paths.pending_dir,
        &paths.plans_dir,
        &paths.archived_dir,
        &paths.logs_dir,
        &paths.scripts_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }

    // Stored relative so the vault can be moved as a unit.
    let stored = OrchestratorConfig {
        vault_root: PathBuf::from("."),
        ..cfg.clone()
    };
    write_config(&config_path, &stored)?;
    Ok(paths)
}
