//! Typed wrappers over the `eth_*`, `debug_*` and `trace_*` methods the
//! tracer, decoder and nonce manager need.
//!
//! Every call is bounded by the API's deadline; an expired deadline surfaces
//! as [`TransportError::Timeout`] and leaves nothing half-applied.

use alloy_primitives::{Address, Bytes, B256, U64};
use chaintrace_core::{Transaction, TransactionReceipt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
}

impl BlockTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Pending => "pending",
        }
    }
}

#[derive(Clone)]
pub struct EthApi {
    transport: Arc<dyn RpcTransport>,
    timeout: Duration,
}

impl EthApi {
    pub fn new(transport: Arc<dyn RpcTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call `method` under the deadline and deserialize its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError> {
        let fut = self.transport.request(method, params);
        let value = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| self.timeout_error())??;
        Ok(serde_json::from_value(value)?)
    }

    fn timeout_error(&self) -> TransportError {
        TransportError::Timeout {
            ms: self.timeout.as_millis() as u64,
        }
    }

    pub async fn transaction_count(
        &self,
        address: Address,
        tag: BlockTag,
    ) -> Result<u64, TransportError> {
        let count: U64 = self
            .call("eth_getTransactionCount", vec![json!(address), json!(tag.as_str())])
            .await?;
        Ok(count.to::<u64>())
    }

    /// Pending transaction counts for all `addresses` in one batch.
    ///
    /// Any failed entry fails the whole call, so callers never see a partial result.
    pub async fn transaction_counts(&self, addresses: &[Address]) -> Result<Vec<u64>, TransportError> {
        if addresses.is_empty() {
            return Ok(vec![]);
        }
        let reqs: Vec<JsonRpcRequest> = addresses
            .iter()
            .map(|a| {
                JsonRpcRequest::new(
                    "eth_getTransactionCount",
                    vec![json!(a), json!(BlockTag::Pending.as_str())],
                )
            })
            .collect();
        let responses = tokio::time::timeout(self.timeout, self.transport.send_batch(reqs))
            .await
            .map_err(|_| self.timeout_error())??;
        if responses.len() != addresses.len() {
            return Err(TransportError::Other(format!(
                "expected {} nonce responses, got {}",
                addresses.len(),
                responses.len()
            )));
        }
        responses
            .into_iter()
            .map(|r| {
                let value = r.into_result().map_err(TransportError::Rpc)?;
                let count: U64 = serde_json::from_value(value)?;
                Ok(count.to::<u64>())
            })
            .collect()
    }

    pub async fn transaction(&self, hash: B256) -> Result<Option<Transaction>, TransportError> {
        self.call("eth_getTransactionByHash", vec![json!(hash)]).await
    }

    pub async fn receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, TransportError> {
        self.call("eth_getTransactionReceipt", vec![json!(hash)]).await
    }

    pub async fn code(&self, address: Address) -> Result<Bytes, TransportError> {
        self.call("eth_getCode", vec![json!(address), json!(BlockTag::Latest.as_str())])
            .await
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, TransportError> {
        self.call("eth_sendRawTransaction", vec![json!(Bytes::copy_from_slice(raw))])
            .await
    }

    /// `debug_traceTransaction` with an arbitrary tracer configuration.
    pub async fn debug_trace_transaction(
        &self,
        hash: B256,
        options: Value,
    ) -> Result<Value, TransportError> {
        self.call("debug_traceTransaction", vec![json!(hash), options]).await
    }

    /// Parity-style flat trace list.
    pub async fn trace_transaction(&self, hash: B256) -> Result<Value, TransportError> {
        self.call("trace_transaction", vec![json!(hash)]).await
    }
}
