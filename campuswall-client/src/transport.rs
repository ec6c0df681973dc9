use async_trait::async_trait;

use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::request::{ApiResponse, RequestDescriptor};

/// Sends a descriptor over the wire. The seam exists so tests (and
/// embedded hosts) can substitute the HTTP stack; classification of the
/// response stays in the pipeline, not here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the call, attaching `token` as a bearer credential when
    /// present. Returns the raw response for any HTTP status; `Err` means
    /// the request never produced a response.
    async fn send(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError>;
}

/// Production transport over `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "request transport failed");
            ApiError::Transport(anyhow::Error::new(e))
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(anyhow::Error::new(e)))?
            .to_vec();

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
