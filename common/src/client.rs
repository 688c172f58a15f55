use anyhow::anyhow;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ApiError;
use crate::schemas::{
    ActionResponse, ErrorBody, HealthResponse, NvramEntry, NvramSyncResponse, ResumeLifsResponse,
    StatusResponse,
};
use crate::trace_middleware::inject_trace_context_reqwest;
use crate::url_utils::sanitize_url;

/// Typed client for one Node Agent's HTTP API.
///
/// Responses are mapped back onto [`ApiError`]: 503 becomes `NodeFailed`,
/// 400 becomes `InvalidState`, a transport failure becomes `Unreachable`.
/// Nothing is retried here.
#[derive(Clone, Debug)]
pub struct NodeClient {
    http: Client,
    name: String,
    base_url: String,
}

impl NodeClient {
    pub fn new(http: Client, name: impl Into<String>, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            name: name.into(),
            base_url: sanitize_url(base_url)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.send(self.http.get(self.url("/health"))).await
    }

    pub async fn status(&self) -> Result<StatusResponse, ApiError> {
        self.send(self.http.get(self.url("/status"))).await
    }

    pub async fn failover(&self) -> Result<ActionResponse, ApiError> {
        self.send(self.http.post(self.url("/failover"))).await
    }

    pub async fn takeover(&self) -> Result<ActionResponse, ApiError> {
        self.send(self.http.post(self.url("/takeover"))).await
    }

    /// Takeover with a per-request deadline; an elapsed deadline surfaces as `Unreachable`.
    pub async fn takeover_within(&self, timeout: Duration) -> Result<ActionResponse, ApiError> {
        self.send(self.http.post(self.url("/takeover")).timeout(timeout))
            .await
    }

    pub async fn giveback(&self) -> Result<ActionResponse, ApiError> {
        self.send(self.http.post(self.url("/giveback"))).await
    }

    pub async fn prepare_giveback(&self) -> Result<ActionResponse, ApiError> {
        self.send(self.http.post(self.url("/prepare-giveback"))).await
    }

    pub async fn complete_giveback(&self) -> Result<ActionResponse, ApiError> {
        self.send(self.http.post(self.url("/complete-giveback"))).await
    }

    pub async fn resume_lifs(&self) -> Result<ResumeLifsResponse, ApiError> {
        self.send(self.http.post(self.url("/lifs/online"))).await
    }

    pub async fn sync_nvram(&self, entry: &NvramEntry) -> Result<NvramSyncResponse, ApiError> {
        self.send(self.http.post(self.url("/nvram/sync")).json(entry))
            .await
    }

    pub async fn nvram_log(&self) -> Result<Vec<NvramEntry>, ApiError> {
        self.send(self.http.get(self.url("/nvram"))).await
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let res = inject_trace_context_reqwest(req)
            .send()
            .await
            .map_err(|e| ApiError::Unreachable(format!("{}: {}", self.name, e)))?;

        let status = res.status();
        if status.is_success() {
            return res.json::<T>().await.map_err(|e| {
                ApiError::Any(anyhow!("bad response body from {}: {}", self.name, e))
            });
        }

        let detail = res
            .json::<ErrorBody>()
            .await
            .map(|b| b.detail)
            .unwrap_or_else(|_| status.to_string());

        Err(match status {
            StatusCode::SERVICE_UNAVAILABLE => ApiError::NodeFailed,
            StatusCode::BAD_REQUEST => {
                ApiError::InvalidState(detail.trim_start_matches("invalid state: ").to_string())
            }
            other => ApiError::UpstreamStatus(other),
        })
    }
}
