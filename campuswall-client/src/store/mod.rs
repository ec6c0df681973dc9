//! Shared session persistence.
//!
//! One `SessionStore` abstraction backs the credential store and anything
//! derived from it: a string key/value store with a broadcast change
//! stream. Independently running client instances that share the same
//! backing medium observe each other's writes as change events and
//! converge on the last write observed. The guarantee is best-effort; no
//! ordering is promised across instances.

use tokio::sync::broadcast;

use crate::error::StoreError;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Where a change event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Mutation performed through this store instance.
    Local,
    /// Mutation written by another instance and picked up from the shared
    /// medium.
    External,
}

/// Emitted on every observed mutation of the store.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub origin: ChangeOrigin,
    /// Keys whose values were added, replaced or removed.
    pub keys: Vec<String>,
}

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    /// Change events for this store. A lagging receiver may miss events;
    /// consumers are expected to re-read the store, not replay the stream.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
