//! Filesystem-backed item store over the pending, plans and archived folders.
//!
//! Items and plans are plain files. An item's plan is found only through
//! [`plan_key`]; nothing else links them. Plans are written no-clobber and
//! archive moves are all-or-nothing per item.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::core::naming::{has_extension, is_plan_key, item_name_for_plan, plan_key};
use crate::io::layout::VaultPaths;

/// A document waiting in pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// File name including extension.
    pub name: String,
    pub content: String,
    pub size_bytes: u64,
}

/// A plan document in the plans folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub key: String,
    pub body: String,
    pub size_bytes: u64,
    /// Creation time when the filesystem reports it, otherwise modification time.
    pub created_at: Option<NaiveDateTime>,
}

impl Plan {
    /// Name of the item this plan belongs to.
    pub fn item_name(&self) -> Option<String> {
        item_name_for_plan(&self.key)
    }
}

/// Number of documents in each location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub pending: usize,
    pub plans: usize,
    pub archived: usize,
}

#[derive(Debug, Clone)]
pub struct ItemStore {
    pending_dir: PathBuf,
    plans_dir: PathBuf,
    archived_dir: PathBuf,
    extension: String,
}

impl ItemStore {
    pub fn new(paths: &VaultPaths, extension: impl Into<String>) -> Self {
        Self {
            pending_dir: paths.pending_dir.clone(),
            plans_dir: paths.plans_dir.clone(),
            archived_dir: paths.archived_dir.clone(),
            extension: extension.into(),
        }
    }

    /// Snapshot of pending items, sorted by name.
    #[instrument(skip_all)]
    pub fn list_pending(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for name in self.list_names(&self.pending_dir)? {
            let path = self.pending_dir.join(&name);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // Removed between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(item = %name, "pending item vanished during listing");
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("read item {}", path.display()));
                }
            };
            items.push(Item {
                size_bytes: bytes.len() as u64,
                content: String::from_utf8_lossy(&bytes).into_owned(),
                name,
            });
        }
        debug!(count = items.len(), "listed pending items");
        Ok(items)
    }

    pub fn plan_path(&self, item: &Item) -> PathBuf {
        self.plans_dir.join(plan_key(&item.name))
    }

    pub fn plan_exists(&self, item: &Item) -> bool {
        self.plan_path(item).exists()
    }

    /// Create the plan for `item`. Never replaces an existing plan.
    #[instrument(skip_all, fields(item = %item.name))]
    pub fn write_plan(&self, item: &Item, text: &str) -> Result<PathBuf> {
        let key = plan_key(&item.name);
        let path = self.plans_dir.join(&key);
        if path.exists() {
            return Err(anyhow!("plan {key} already exists, refusing to overwrite"));
        }
        let mut tmp = NamedTempFile::new_in(&self.plans_dir)
            .with_context(|| format!("create temp plan in {}", self.plans_dir.display()))?;
        tmp.write_all(text.as_bytes())
            .with_context(|| format!("write temp plan for {key}"))?;
        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == ErrorKind::AlreadyExists {
                anyhow!("plan {key} already exists, refusing to overwrite")
            } else {
                anyhow::Error::new(e.error).context(format!("persist plan {}", path.display()))
            }
        })?;
        debug!(plan = %key, bytes = text.len(), "plan written");
        Ok(path)
    }

    /// Snapshot of all plans, sorted by key.
    pub fn list_plans(&self) -> Result<Vec<Plan>> {
        let mut plans = Vec::new();
        for key in self.list_names(&self.plans_dir)? {
            if !is_plan_key(&key, &self.extension) {
                continue;
            }
            let path = self.plans_dir.join(&key);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("read plan {}", path.display())),
            };
            let created_at = fs::metadata(&path)
                .ok()
                .and_then(|meta| meta.created().or_else(|_| meta.modified()).ok())
                .map(|time| DateTime::<Local>::from(time).naive_local());
            plans.push(Plan {
                key,
                size_bytes: bytes.len() as u64,
                body: String::from_utf8_lossy(&bytes).into_owned(),
                created_at,
            });
        }
        Ok(plans)
    }

    pub fn is_pending(&self, item_name: &str) -> bool {
        self.pending_dir.join(item_name).is_file()
    }

    /// Move `item_name` from pending to archived.
    ///
    /// The item ends up in exactly one of the two folders: on any failure it is
    /// still in pending and absent from archived.
    #[instrument(skip_all, fields(item = %item_name))]
    pub fn archive(&self, item_name: &str) -> Result<PathBuf> {
        let src = self.pending_dir.join(item_name);
        let dest = self.archived_dir.join(item_name);
        if !src.is_file() {
            return Err(anyhow!("item {item_name} is not in pending"));
        }
        if dest.exists() {
            return Err(anyhow!(
                "item {item_name} already exists in archive, leaving it in pending"
            ));
        }
        match fs::rename(&src, &dest) {
            Ok(()) => {
                debug!("archived by rename");
                Ok(dest)
            }
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                warn!("archive folder on another filesystem, copying");
                copy_then_remove(&src, &dest, &self.archived_dir)?;
                Ok(dest)
            }
            Err(e) => Err(e).with_context(|| {
                format!("move {} to {}", src.display(), dest.display())
            }),
        }
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            pending: self.list_names(&self.pending_dir)?.len(),
            plans: self
                .list_names(&self.plans_dir)?
                .iter()
                .filter(|name| is_plan_key(name, &self.extension))
                .count(),
            archived: self.list_names(&self.archived_dir)?.len(),
        })
    }

    /// Sorted names of regular, non-hidden files with the item extension.
    fn list_names(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let Ok(name) = entry.file_name().into_string() else {
                warn!(dir = %dir.display(), "skipping non-UTF-8 file name");
                continue;
            };
            if name.starts_with('.') || !has_extension(&name, &self.extension) {
                continue;
            }
            let is_file = entry
                .file_type()
                .map(|ft| ft.is_file())
                .unwrap_or(false);
            if is_file {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Cross-device archive: stage a copy inside the archive folder, publish it
/// no-clobber, then drop the source. Rolls the copy back if the source stays.
fn copy_then_remove(src: &Path, dest: &Path, archived_dir: &Path) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(archived_dir)
        .with_context(|| format!("create temp file in {}", archived_dir.display()))?;
    let mut reader =
        fs::File::open(src).with_context(|| format!("open {}", src.display()))?;
    std::io::copy(&mut reader, tmp.as_file_mut())
        .with_context(|| format!("copy {}", src.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync copy of {}", src.display()))?;
    tmp.persist_noclobber(dest)
        .map_err(|e| anyhow::Error::new(e.error))
        .with_context(|| format!("publish {}", dest.display()))?;

    if let Err(e) = fs::remove_file(src) {
        if let Err(rollback) = fs::remove_file(dest) {
            warn!(err = %rollback, "rollback of archive copy failed");
        }
        return Err(e).with_context(|| format!("remove {} after copy", src.display()));
    }
    Ok(())
}
