//! Per-cluster-name mutual exclusion.
//!
//! Two layers: an in-process async mutex per name, and an advisory `fs2`
//! lock on `<locks_dir>/<name>.lock` so separate CLI processes serialise too.
//! Both are released when the [`NameGuard`] drops, on every exit path.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

type LockMap = HashMap<String, Arc<Mutex<()>>>;

#[derive(Clone)]
pub struct NameLocks {
    entries: Arc<parking_lot::Mutex<LockMap>>,
    /// `None` disables the cross-process layer (ephemeral orchestrators).
    locks_dir: Option<PathBuf>,
}

impl NameLocks {
    pub fn new(locks_dir: Option<PathBuf>) -> Self {
        Self {
            entries: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            locks_dir,
        }
    }

    /// Wait until `name` is free and take it.
    pub async fn acquire(&self, name: &str) -> Result<NameGuard> {
        let mutex = {
            let mut entries = self.entries.lock();
            entries
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        // Removes the entry again if this future is dropped mid-wait.
        let mut pending = PendingEntry {
            entries: &self.entries,
            name,
            armed: true,
        };
        let guard = mutex.lock_owned().await;
        pending.armed = false;
        debug!("Acquired in-process lock for '{}'", name);

        let mut name_guard = NameGuard {
            name: name.to_string(),
            entries: Arc::clone(&self.entries),
            guard: Some(guard),
            file: None,
        };

        if let Some(dir) = &self.locks_dir {
            // dropping name_guard on error releases the in-process lock
            name_guard.file = Some(lock_file(dir.join(format!("{}.lock", name))).await?);
        }

        Ok(name_guard)
    }

    /// Number of names with a live lock entry.
    pub fn active(&self) -> usize {
        self.entries.lock().len()
    }
}

async fn lock_file(path: PathBuf) -> Result<File> {
    tokio::task::spawn_blocking(move || -> Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Filesystem(format!("Failed to create lock directory: {}", e))
            })?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Filesystem(format!("Failed to open lock file: {}", e)))?;

        // Blocks while another process operates on the same cluster
        FileExt::lock_exclusive(&file).map_err(|e| {
            Error::Filesystem(format!("Failed to lock {}: {}", path.display(), e))
        })?;

        if file.set_len(0).is_ok() {
            let _ = writeln!(file, "{}", std::process::id());
        }
        debug!("Acquired advisory lock on {:?}", path);
        Ok(file)
    })
    .await
    .map_err(|e| Error::Filesystem(format!("Lock task failed: {}", e)))?
}

struct PendingEntry<'a> {
    entries: &'a Arc<parking_lot::Mutex<LockMap>>,
    name: &'a str,
    armed: bool,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.entries.lock();
        if let Some(mutex) = entries.get(self.name) {
            if Arc::strong_count(mutex) == 1 {
                entries.remove(self.name);
            }
        }
    }
}

/// Held for the duration of one lifecycle operation.
pub struct NameGuard {
    name: String,
    entries: Arc<parking_lot::Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
    file: Option<File>,
}

impl NameGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to release advisory lock for '{}': {}", self.name, e);
            }
        }

        drop(self.guard.take());

        // Waiters clone the Arc under the map lock, so a count of one means
        // nobody else is queued on this name.
        let mut entries = self.entries.lock();
        if let Some(mutex) = entries.get(&self.name) {
            if Arc::strong_count(mutex) == 1 {
                entries.remove(&self.name);
            }
        }
    }
}
