use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::config::RemoteCredentials;
use crate::error::{Result, StoreError};
use crate::hrana::{PipelineRequest, PipelineResponse};
use crate::traits::RemoteTransport;

/// Hrana-over-HTTP transport using a shared reqwest client.
pub struct HranaTransport {
    client: Client,
    pipeline_url: Url,
    auth_token: String,
}

impl HranaTransport {
    pub fn new(credentials: &RemoteCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            pipeline_url: pipeline_url(&credentials.url)?,
            auth_token: credentials.auth_token.clone(),
        })
    }

    pub fn pipeline_url(&self) -> &Url {
        &self.pipeline_url
    }
}

#[async_trait]
impl RemoteTransport for HranaTransport {
    async fn pipeline(&self, request: &PipelineRequest) -> Result<PipelineResponse> {
        let response = self
            .client
            .post(self.pipeline_url.clone())
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<PipelineResponse>().await.map_err(|e| {
                StoreError::Connection(format!("malformed pipeline response: {}", e))
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_http_status(status, &body))
    }
}

/// `{base}/v2/pipeline`, keeping any path prefix on the base URL.
fn pipeline_url(base: &Url) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("v2/pipeline")
        .map_err(|e| StoreError::Config(format!("invalid pipeline URL: {}", e)))
}

fn map_reqwest_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() {
        StoreError::Unavailable(format!("remote store unreachable: {}", e))
    } else {
        StoreError::Connection(e.to_string())
    }
}

/// 400 carries a statement the server refused; everything else is transport.
fn map_http_status(status: StatusCode, body: &str) -> StoreError {
    let detail = body.trim();
    match status {
        StatusCode::BAD_REQUEST => StoreError::Statement(format!("remote rejected request: {}", detail)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Connection(format!("remote authentication failed ({})", status))
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            StoreError::Unavailable(format!("remote store unavailable ({})", status))
        }
        _ => StoreError::Connection(format!("unexpected HTTP status {}: {}", status, detail)),
    }
}
