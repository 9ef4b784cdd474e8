//! Geth-style `debug_traceTransaction` with the built-in `callTracer`.
//!
//! The tracer returns one nested JSON object per frame:
//!
//! ```json
//! { "type": "CALL", "from": "0x..", "to": "0x..", "value": "0x0",
//!   "gas": "0x..", "gasUsed": "0x..", "input": "0x..", "output": "0x..",
//!   "error": "execution reverted", "calls": [ ... ], "logs": [ ... ] }
//! ```
//!
//! `value` is absent on STATICCALL/DELEGATECALL, `to` on some failed
//! creations, and `logs` unless `withLog` is set.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use chaintrace_core::{CallFrame, CallKind, RawLog};
use chaintrace_rpc::EthApi;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::TraceError;
use crate::source::CallTraceSource;

pub const DEBUG_TRACE_METHOD: &str = "debug_traceTransaction";

/// One frame as emitted by `callTracer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTracerFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default)]
    pub gas: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U64>,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub output: Option<Bytes>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallTracerFrame>,
    #[serde(default)]
    pub logs: Vec<CallTracerLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallTracerLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

impl CallTracerFrame {
    pub fn into_frame(self) -> CallFrame {
        let kind = CallKind::parse(&self.kind);
        let output = self.output.unwrap_or_default();
        let reverted = self.error.is_some();

        let mut frame = CallFrame::new(kind, self.from, self.to.unwrap_or(Address::ZERO), self.input)
            .with_output(output.clone())
            .with_value(self.value.unwrap_or(U256::ZERO))
            .with_gas(
                self.gas.map_or(0, |g| g.to::<u64>()),
                self.gas_used.map_or(0, |g| g.to::<u64>()),
            );
        frame.error = self.error;
        if reverted && !output.is_empty() {
            frame.revert_data = Some(output);
        } else if kind.is_create() && !reverted && !output.is_empty() {
            // A successful CREATE returns the deployed runtime code.
            frame.code = Some(output);
        }
        frame.logs = self
            .logs
            .into_iter()
            .map(|l| RawLog {
                address: l.address,
                topics: l.topics,
                data: l.data,
            })
            .collect();
        frame.children = self.calls.into_iter().map(CallTracerFrame::into_frame).collect();
        frame
    }
}

/// Parse a raw `callTracer` result.
pub fn parse_call_tracer(tx_hash: B256, raw: Value) -> Result<CallFrame, TraceError> {
    if raw.is_null() {
        return Err(TraceError::EmptyTrace { tx_hash });
    }
    let frame: CallTracerFrame = serde_json::from_value(raw)
        .map_err(|e| TraceError::malformed(format!("callTracer frame: {e}")))?;
    Ok(frame.into_frame())
}

pub struct CallTracerSource {
    eth: EthApi,
    with_logs: bool,
}

impl CallTracerSource {
    pub fn new(eth: EthApi) -> Self {
        Self { eth, with_logs: true }
    }

    /// Ask for per-frame logs (`tracerConfig.withLog`). On by default.
    pub fn with_logs(mut self, enabled: bool) -> Self {
        self.with_logs = enabled;
        self
    }

    fn options(&self) -> Value {
        json!({
            "tracer": "callTracer",
            "tracerConfig": { "withLog": self.with_logs },
        })
    }
}

#[async_trait]
impl CallTraceSource for CallTracerSource {
    fn name(&self) -> &'static str {
        "callTracer"
    }

    async fn trace(&self, tx_hash: B256) -> Result<CallFrame, TraceError> {
        let raw = self
            .eth
            .debug_trace_transaction(tx_hash, self.options())
            .await
            .map_err(|e| TraceError::from_transport(DEBUG_TRACE_METHOD, e))?;
        parse_call_tracer(tx_hash, raw)
    }
}
