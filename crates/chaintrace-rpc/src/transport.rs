//! The `RpcTransport` trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Async JSON-RPC transport.
///
/// Object-safe; the rest of the workspace holds it as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send several requests. Responses are returned in request order.
    ///
    /// The default sends them one by one; override for real batching.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Endpoint URL or a descriptive name.
    fn url(&self) -> &str;

    /// Call `method` and return the raw result value.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let resp = self.send(JsonRpcRequest::new(method, params)).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }
}
