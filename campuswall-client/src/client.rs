//! The request pipeline facade.
//!
//! Every outbound call goes through [`ApiClient::execute`]: the current
//! credential is attached before send, and the response is classified
//! after receipt. Unauthenticated failures are handed to the session gate
//! instead of the caller; everything else surfaces immediately.

use std::sync::Arc;

use http::StatusCode;
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::gate::{ReauthPrompt, SessionGate};
use crate::models::UserProfile;
use crate::request::{ApiResponse, RequestDescriptor};
use crate::store::{SessionStore, StoreChange};
use crate::transport::{HttpTransport, Transport};

#[derive(Clone)]
pub struct ApiClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) credentials: CredentialStore,
    pub(crate) gate: SessionGate,
}

impl ApiClient {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn SessionStore>,
        prompt: Arc<dyn ReauthPrompt>,
    ) -> Result<Self, ApiError> {
        let transport = Arc::new(HttpTransport::new(&settings.api)?);
        Ok(Self::with_transport(transport, store, prompt))
    }

    /// Build a client over a custom transport. Used by tests and by hosts
    /// that bring their own HTTP stack.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        prompt: Arc<dyn ReauthPrompt>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                credentials: CredentialStore::new(store),
                gate: SessionGate::new(prompt),
            }),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Whether a re-authentication episode is currently active.
    pub fn gate_open(&self) -> bool {
        self.inner.gate.is_open()
    }

    /// Number of calls currently suspended by the gate.
    pub fn suspended_requests(&self) -> usize {
        self.inner.gate.pending_requests()
    }

    /// Change events for the stored credential; see
    /// [`ApiClient::refresh_profile`] for the expected reaction.
    pub fn credential_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.credentials.changes()
    }

    /// Issue one call through the authenticated pipeline.
    ///
    /// A 401 on a first attempt suspends the call in the session gate; the
    /// returned future stays pending until the episode resolves. A 401 on
    /// a replayed call, and every other failure, surfaces immediately.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let token = self.inner.credentials.token()?;
        let response = self.inner.transport.send(&request, token.as_deref()).await?;

        if response.status.is_success() {
            return Ok(response);
        }

        if response.status == StatusCode::UNAUTHORIZED && !request.gate_exempt {
            if request.retried {
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    "replayed request rejected again, resolving as terminal"
                );
                // The freshly stored credential is itself invalid; drop it.
                if let Err(e) = self.inner.credentials.clear() {
                    tracing::warn!(error = %e, "failed to clear rejected credential");
                }
                return Err(ApiError::AuthFailed);
            }
            let settled = self.inner.gate.admit(request);
            return match settled.await {
                Ok(result) => result,
                // The gate was dropped with the call still queued; only
                // reachable when the whole client is being torn down.
                Err(_) => Err(ApiError::Canceled),
            };
        }

        Err(ApiError::Status {
            status: response.status,
            body: response.text(),
        })
    }

    /// Signal from the re-auth surface that a fresh credential has been
    /// stored. Replays every suspended call in enqueue order and settles
    /// each original caller with whatever its replay yields.
    pub async fn complete_reauth(&self) {
        let drained = self.inner.gate.resolve_success();
        for pending in drained {
            let seq = pending.seq;
            let result = self.execute(pending.descriptor).await;
            if let Err(e) = &result {
                tracing::debug!(seq, error = %e, "replayed request failed");
            }
            if pending.completion.send(result).is_err() {
                tracing::debug!(seq, "suspended caller went away before replay finished");
            }
        }
    }

    /// Signal from the re-auth surface that the user closed it without
    /// authenticating. Every suspended caller rejects with
    /// [`ApiError::AuthRequired`]; nothing is replayed.
    pub fn abandon_reauth(&self) {
        self.inner.gate.resolve_cancelled();
    }

    /// Refresh user-derived state after a credential change.
    ///
    /// With a token present the profile is re-fetched and cached; a 401 on
    /// that fetch clears the stored credential entirely, so a stale token
    /// cannot keep resurrecting itself. Without a token the cached profile
    /// is dropped. This is the reaction every instance owes the store's
    /// change stream.
    pub async fn refresh_profile(&self) -> Result<Option<UserProfile>, ApiError> {
        if self.inner.credentials.token()?.is_none() {
            self.inner.credentials.clear_profile()?;
            return Ok(None);
        }

        let request = RequestDescriptor::get("/users/info").exempt();
        match self.execute(request).await {
            Ok(response) => {
                let profile: UserProfile = response.json()?;
                self.inner.credentials.store_profile(&profile)?;
                Ok(Some(profile))
            }
            Err(ApiError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED => {
                tracing::warn!("stored token rejected while refreshing profile, clearing session");
                self.inner.credentials.clear()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
