//! Re-auth surface traffic: login, registration, logout.
//!
//! These calls are marked gate-exempt before they leave the client, so a
//! rejected login surfaces as an ordinary status error instead of
//! recursing into the session gate it is supposed to resolve.

use serde::Deserialize;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::UserProfile;
use crate::request::RequestDescriptor;

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    token: String,
    #[serde(default)]
    user: Option<UserProfile>,
}

impl ApiClient {
    /// Exchange name/password for a bearer token and cache the profile.
    ///
    /// Storing the credential is all this does; resolving an open gate
    /// episode is the surface's separate, explicit signal
    /// ([`ApiClient::complete_reauth`]).
    pub async fn login(&self, name: &str, password: &str) -> Result<Option<UserProfile>, ApiError> {
        let request = RequestDescriptor::post("/auth/login")
            .json(serde_json::json!({
                "name": name.trim(),
                "password": password,
            }))
            .exempt();

        let response = self.execute(request).await?;
        let LoginResponse { token } = response.json()?;
        self.inner.credentials.store_token(&token)?;
        tracing::info!("login succeeded");

        self.refresh_profile().await
    }

    /// Create an account; the backend logs the new user straight in.
    pub async fn register(
        &self,
        name: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, ApiError> {
        let request = RequestDescriptor::post("/auth/register")
            .json(serde_json::json!({
                "name": name.trim(),
                "password": password,
            }))
            .exempt();

        let response = self.execute(request).await?;
        let RegisterResponse { token, user } = response.json()?;
        self.inner.credentials.store_token(&token)?;
        if let Some(user) = &user {
            self.inner.credentials.store_profile(user)?;
        }
        tracing::info!("registration succeeded");

        match user {
            Some(user) => Ok(Some(user)),
            None => self.refresh_profile().await,
        }
    }

    /// Drop the stored credential. An episode open at logout time is
    /// cancelled, so no caller stays suspended against a credential that
    /// no longer exists.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.inner.credentials.clear()?;
        self.abandon_reauth();
        tracing::info!("logged out");
        Ok(())
    }
}
