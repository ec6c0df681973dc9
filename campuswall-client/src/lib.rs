//! Session-aware API client core for the Campuswall social app.
//!
//! Feature modules (posts, comments, friends, admin) are plain request
//! issuers with no session awareness; this crate gives them one: every
//! call carries the current bearer token, and a 401 suspends the call
//! behind a single interactive re-authentication episode instead of
//! failing it. Once the user re-authenticates, suspended calls replay in
//! order with the fresh credential; if the user gives up, they all reject
//! with a distinguished error. The credential itself lives in a shared
//! session store so that other client instances on the same machine pick
//! up logins and logouts as they happen.

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod models;
pub mod observability;
pub mod request;
pub mod store;
pub mod transport;

pub use client::ApiClient;
pub use credentials::{Credential, CredentialStore};
pub use error::{ApiError, StoreError};
pub use gate::{ChannelPrompt, ReauthPrompt};
pub use models::UserProfile;
pub use request::{ApiResponse, RequestDescriptor};
pub use store::{ChangeOrigin, FileStore, MemoryStore, SessionStore, StoreChange};
