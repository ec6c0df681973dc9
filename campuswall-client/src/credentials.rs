//! Typed credential facade over the shared session store.
//!
//! The credential store is the only component that mutates the persisted
//! token and cached profile; everything else reads snapshots through it or
//! reacts to its change stream.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::models::UserProfile;
use crate::store::{SessionStore, StoreChange};

pub const TOKEN_KEY: &str = "token";
pub const PROFILE_KEY: &str = "user";

/// Snapshot of the stored credential.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    pub token: Option<String>,
    pub profile: Option<UserProfile>,
}

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SessionStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Current bearer token, if any. Absence is a valid state.
    pub fn token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(TOKEN_KEY)
    }

    /// Cached profile, if any. A corrupt cache entry is dropped and
    /// reported as absent rather than poisoning every caller.
    pub fn profile(&self) -> Result<Option<UserProfile>, StoreError> {
        let Some(raw) = self.store.get(PROFILE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable cached profile");
                self.store.remove(PROFILE_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn credential(&self) -> Result<Credential, StoreError> {
        Ok(Credential {
            token: self.token()?,
            profile: self.profile()?,
        })
    }

    pub fn store_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn store_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let raw = serde_json::to_string(profile)?;
        self.store.set(PROFILE_KEY, &raw)
    }

    pub fn clear_profile(&self) -> Result<(), StoreError> {
        self.store.remove(PROFILE_KEY)
    }

    /// Remove the token and cached profile. Emits the same change
    /// notification as any other mutation.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(PROFILE_KEY)
    }

    /// Change events from the underlying store, local and external alike.
    /// An instance observing one should treat the store as authoritative
    /// and refresh its user-derived state.
    pub fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }
}
