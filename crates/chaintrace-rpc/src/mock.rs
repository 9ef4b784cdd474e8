//! Scripted in-memory transport for tests.
//!
//! Responses are resolved per method in this order: one-shot queued
//! responses, then a handler closure, then a fixed response. Methods with
//! nothing scripted answer with JSON-RPC `-32601 method not found`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{TransportError, METHOD_NOT_FOUND};
use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

type Handler = Arc<dyn Fn(&[Value]) -> Result<Value, TransportError> + Send + Sync>;

#[derive(Default)]
struct Script {
    fixed: HashMap<String, Value>,
    queued: HashMap<String, VecDeque<Result<Value, TransportError>>>,
    handlers: HashMap<String, Handler>,
    delays: HashMap<String, Duration>,
    requests: Vec<JsonRpcRequest>,
}

#[derive(Default)]
pub struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every `method` call with `value`.
    pub fn on(&self, method: &str, value: Value) {
        self.script().fixed.insert(method.into(), value);
    }

    /// Answer the next unanswered `method` call with `value`.
    pub fn push(&self, method: &str, value: Value) {
        self.script()
            .queued
            .entry(method.into())
            .or_default()
            .push_back(Ok(value));
    }

    /// Fail the next unanswered `method` call with `err`.
    pub fn push_error(&self, method: &str, err: TransportError) {
        self.script()
            .queued
            .entry(method.into())
            .or_default()
            .push_back(Err(err));
    }

    /// Compute `method` responses from the request params.
    pub fn handle<F>(&self, method: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        self.script().handlers.insert(method.into(), Arc::new(f));
    }

    /// Sleep before answering `method`.
    pub fn delay(&self, method: &str, delay: Duration) {
        self.script().delays.insert(method.into(), delay);
    }

    /// Number of requests received for `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.script()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn requests(&self) -> Vec<JsonRpcRequest> {
        self.script().requests.clone()
    }

    fn resolve(&self, req: &JsonRpcRequest) -> (Result<Value, TransportError>, Option<Duration>) {
        let mut script = self.script();
        script.requests.push(req.clone());
        let delay = script.delays.get(&req.method).copied();

        if let Some(next) = script.queued.get_mut(&req.method).and_then(VecDeque::pop_front) {
            return (next, delay);
        }
        let handler = script.handlers.get(&req.method).cloned();
        if let Some(handler) = handler {
            drop(script);
            return (handler(&req.params), delay);
        }
        if let Some(value) = script.fixed.get(&req.method) {
            return (Ok(value.clone()), delay);
        }
        let err = TransportError::Rpc(JsonRpcError {
            code: METHOD_NOT_FOUND,
            message: format!("the method {} does not exist/is not available", req.method),
            data: None,
        });
        (Err(err), delay)
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let (result, delay) = self.resolve(&req);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match result {
            Ok(value) => Ok(JsonRpcResponse::success(req.id, value)),
            Err(TransportError::Rpc(e)) => Ok(JsonRpcResponse::failure(req.id, e)),
            Err(e) => Err(e),
        }
    }

    fn url(&self) -> &str {
        "mock://"
    }
}
