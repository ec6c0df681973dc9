use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{ChangeOrigin, SessionStore, StoreChange};
use crate::error::StoreError;

/// In-process store with no persistence. One instance per process, so
/// every change event it emits is `Local`.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            entries: Mutex::new(HashMap::new()),
            changes,
        }
    }

    fn notify(&self, keys: Vec<String>) {
        // Nobody listening is fine.
        let _ = self.changes.send(StoreChange {
            origin: ChangeOrigin::Local,
            keys,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("store mutex poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let changed = {
            let mut entries = self.entries.lock().map_err(|e| {
                StoreError::Internal(anyhow::anyhow!("store mutex poisoned: {}", e))
            })?;
            entries.insert(key.to_string(), value.to_string()) != Some(value.to_string())
        };
        if changed {
            self.notify(vec![key.to_string()]);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut entries = self.entries.lock().map_err(|e| {
                StoreError::Internal(anyhow::anyhow!("store mutex poisoned: {}", e))
            })?;
            entries.remove(key).is_some()
        };
        if removed {
            self.notify(vec![key.to_string()]);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let keys: Vec<String> = {
            let mut entries = self.entries.lock().map_err(|e| {
                StoreError::Internal(anyhow::anyhow!("store mutex poisoned: {}", e))
            })?;
            entries.drain().map(|(k, _)| k).collect()
        };
        if !keys.is_empty() {
            self.notify(keys);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
