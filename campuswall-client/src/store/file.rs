use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{ChangeOrigin, SessionStore, StoreChange};
use crate::error::StoreError;

/// Store persisted as one JSON object in a file shared by every client
/// instance on the machine.
///
/// Mutations rewrite the file and broadcast a `Local` change in-process. A
/// background task polls the file so that writes made by *other* processes
/// surface as `External` changes, the way a browser tab observes the
/// `storage` event. Propagation is best-effort: last write observed wins,
/// and a write landing between two polls is seen once, not twice.
///
/// File I/O is synchronous and happens under the entries lock, on the
/// watcher path included; the session file is a handful of keys, so no
/// call blocks long enough to justify `spawn_blocking`.
pub struct FileStore {
    inner: Arc<Inner>,
    watcher: JoinHandle<()>,
}

struct Inner {
    path: PathBuf,
    // In-memory mirror of the file, used to diff external writes.
    entries: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl FileStore {
    pub fn from_settings(settings: &crate::config::SessionSettings) -> Result<Self, StoreError> {
        Self::open(&settings.file, settings.watch_interval())
    }

    /// Open (or create) the store at `path` and start watching it for
    /// external changes. Must be called from within a Tokio runtime.
    pub fn open(path: impl AsRef<Path>, watch_interval: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;
        let (changes, _) = broadcast::channel(16);

        let inner = Arc::new(Inner {
            path,
            entries: Mutex::new(entries),
            changes,
        });

        let watcher = tokio::spawn(watch_for_external_changes(inner.clone(), watch_interval));

        Ok(Self { inner, watcher })
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut HashMap<String, String>) -> Vec<String>,
    ) -> Result<(), StoreError> {
        let keys = {
            let mut entries = self.inner.lock_entries()?;
            let keys = apply(&mut entries);
            if !keys.is_empty() {
                write_entries(&self.inner.path, &entries)?;
            }
            keys
        };
        if !keys.is_empty() {
            self.inner.notify(ChangeOrigin::Local, keys);
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

impl Inner {
    fn lock_entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("store mutex poisoned: {}", e)))
    }

    fn notify(&self, origin: ChangeOrigin, keys: Vec<String>) {
        let _ = self.changes.send(StoreChange { origin, keys });
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock_entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            if entries.insert(key.to_string(), value.to_string()).as_deref() == Some(value) {
                Vec::new()
            } else {
                vec![key.to_string()]
            }
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            if entries.remove(key).is_some() {
                vec![key.to_string()]
            } else {
                Vec::new()
            }
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.mutate(|entries| entries.drain().map(|(k, _)| k).collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }
}

fn read_entries(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_entries(path: &Path, entries: &HashMap<String, String>) -> Result<(), StoreError> {
    let contents = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, contents)?;
    Ok(())
}

async fn watch_for_external_changes(inner: Arc<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let changed: Vec<String> = {
            let mut entries = match inner.lock_entries() {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            // The disk read must happen under the entries lock: a snapshot
            // taken outside it can predate a concurrent local `mutate` and
            // would roll the fresh write back when diffed against the
            // mirror. `mutate` writes the file under the same lock, so
            // inside it disk and mirror only differ after an external
            // write.
            let on_disk = match read_entries(&inner.path) {
                Ok(on_disk) => on_disk,
                Err(e) => {
                    // A concurrent writer can leave the file half-written
                    // for a moment; skip this tick and re-read on the next
                    // one.
                    tracing::debug!(path = %inner.path.display(), error = %e, "session file unreadable, will retry");
                    continue;
                }
            };
            let mut changed: Vec<String> = entries
                .iter()
                .filter(|&(k, v)| on_disk.get(k.as_str()) != Some(v))
                .map(|(k, _)| k.clone())
                .collect();
            for key in on_disk.keys() {
                if !entries.contains_key(key) {
                    changed.push(key.clone());
                }
            }
            if !changed.is_empty() {
                *entries = on_disk;
            }
            changed
        };

        if !changed.is_empty() {
            tracing::debug!(keys = ?changed, "observed external session change");
            inner.notify(ChangeOrigin::External, changed);
        }
    }
}
