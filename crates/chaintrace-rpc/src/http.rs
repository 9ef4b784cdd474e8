//! HTTP JSON-RPC client backed by `reqwest`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::RpcTransport;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP transport. Transient failures (connection errors, timeouts,
/// rate-limit responses) are retried with exponential backoff.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
        })
    }

    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<R>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp: JsonRpcResponse = self.retry.run(&req.method, || self.post(&req)).await?;
        tracing::trace!(method = %req.method, id = req.id, ok = resp.error.is_none(), url = %self.url, "rpc response");
        Ok(resp)
    }

    /// One HTTP call carrying a JSON array; responses are reordered to match `reqs`.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let mut responses: Vec<JsonRpcResponse> =
            self.retry.run("batch", || self.post(&reqs)).await?;
        reorder_by_id(&reqs, &mut responses)?;
        Ok(responses)
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Servers may answer a batch in any order.
pub(crate) fn reorder_by_id(
    reqs: &[JsonRpcRequest],
    responses: &mut Vec<JsonRpcResponse>,
) -> Result<(), TransportError> {
    if responses.len() != reqs.len() {
        return Err(TransportError::Other(format!(
            "batch returned {} responses for {} requests",
            responses.len(),
            reqs.len()
        )));
    }
    let mut ordered = Vec::with_capacity(reqs.len());
    for req in reqs {
        let pos = responses
            .iter()
            .position(|r| r.id_u64() == Some(req.id))
            .ok_or_else(|| TransportError::Other(format!("batch response missing id {}", req.id)))?;
        ordered.push(responses.swap_remove(pos));
    }
    *responses = ordered;
    Ok(())
}
