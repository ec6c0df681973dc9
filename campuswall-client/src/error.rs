use http::StatusCode;
use thiserror::Error;

/// Errors surfaced to feature callers by the request pipeline.
///
/// A suspended call (401 admitted to the session gate) never surfaces here
/// while its episode is in flight; from the caller's perspective the call
/// simply takes longer and then resolves with either a real response or one
/// of these variants.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(anyhow::Error),

    /// The backend answered with a non-success status other than a
    /// recoverable 401.
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },

    /// Re-authentication was abandoned while this call was suspended.
    #[error("authentication required")]
    AuthRequired,

    /// The call was replayed with a fresh credential and was rejected
    /// again; retrying further cannot succeed.
    #[error("authentication failed")]
    AuthFailed,

    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The suspended call was dropped before its episode resolved.
    #[error("request was dropped before completion")]
    Canceled,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(anyhow::Error::new(err))
    }
}

impl ApiError {
    /// Status code of the failed response, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the shared session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(anyhow::Error),
}
