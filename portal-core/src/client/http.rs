use crate::structs::{Credentials, Network, SaveResult, ScanResponse};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Requests that take longer than this count as transport failures.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never completed: connection refused, reset, timeout...
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The task running the request panicked.
    #[error("request task failed: {0}")]
    Task(String),
}

/// HTTP client for a provisioning portal.
#[derive(Debug, Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
}

impl PortalClient {
    /// `base_url` is the portal origin, e.g. `http://192.168.4.1`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /scan`. An absent `networks` field decodes as an empty list.
    pub async fn scan(&self) -> Result<Vec<Network>, ClientError> {
        let response = self.http.get(self.url("/scan")).send().await?;
        let body: ScanResponse = decode(response).await?;
        tracing::debug!(count = body.networks.len(), "Scan response received");
        Ok(body.networks)
    }

    /// `POST /save` with a JSON body.
    pub async fn save(&self, credentials: &Credentials) -> Result<SaveResult, ClientError> {
        let response = self
            .http
            .post(self.url("/save"))
            .json(credentials)
            .send()
            .await?;
        let result: SaveResult = decode(response).await?;
        tracing::debug!(success = result.success, "Save response received");
        Ok(result)
    }
}

// 非 2xx 状态和无法解析的 JSON 一律视为失败
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status(status));
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = PortalClient::new("http://192.168.4.1/").unwrap();
        assert_eq!(client.base_url(), "http://192.168.4.1");
        assert_eq!(client.url("/scan"), "http://192.168.4.1/scan");
    }
}
