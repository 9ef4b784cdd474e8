//! Parity/OpenEthereum-style `trace_transaction` (Erigon, Nethermind, Reth).
//!
//! The node returns a flat list of frames in pre-order; each carries its
//! position in the tree as `traceAddress` (`[]` for the root, `[1, 0]` for
//! the first child of the second child). The tree is rebuilt from those
//! paths. This format carries no per-frame logs.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use chaintrace_core::{CallFrame, CallKind};
use chaintrace_rpc::EthApi;
use serde::Deserialize;
use serde_json::Value;

use crate::error::TraceError;
use crate::source::CallTraceSource;

pub const TRACE_TRANSACTION_METHOD: &str = "trace_transaction";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityTrace {
    pub action: ParityAction,
    #[serde(default)]
    pub result: Option<ParityResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub trace_address: Vec<usize>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Union of the call, create and suicide action shapes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityAction {
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub creation_method: Option<String>,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub gas: Option<U64>,
    #[serde(default)]
    pub input: Option<Bytes>,
    #[serde(default)]
    pub init: Option<Bytes>,
    #[serde(default)]
    pub value: Option<U256>,
    /// Self-destructing contract.
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub refund_address: Option<Address>,
    #[serde(default)]
    pub balance: Option<U256>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityResult {
    #[serde(default)]
    pub gas_used: Option<U64>,
    #[serde(default)]
    pub output: Option<Bytes>,
    /// Created contract.
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub code: Option<Bytes>,
}

impl ParityTrace {
    fn call_kind(&self) -> CallKind {
        match self.kind.as_str() {
            "call" => self
                .action
                .call_type
                .as_deref()
                .map_or(CallKind::Call, CallKind::parse),
            "create" => match self.action.creation_method.as_deref() {
                Some("create2") => CallKind::Create2,
                _ => CallKind::Create,
            },
            other => CallKind::parse(other),
        }
    }

    fn into_frame(self) -> CallFrame {
        let kind = self.call_kind();
        let result = self.result.unwrap_or_default();
        let action = self.action;

        let (from, to, input, value) = match kind {
            CallKind::Create | CallKind::Create2 => (
                action.from.unwrap_or_default(),
                result.address.unwrap_or_default(),
                action.init.unwrap_or_default(),
                action.value.unwrap_or_default(),
            ),
            CallKind::SelfDestruct => (
                action.address.unwrap_or_default(),
                action.refund_address.unwrap_or_default(),
                Bytes::new(),
                action.balance.unwrap_or_default(),
            ),
            _ => (
                action.from.unwrap_or_default(),
                action.to.unwrap_or_default(),
                action.input.unwrap_or_default(),
                action.value.unwrap_or_default(),
            ),
        };

        let output = result.output.unwrap_or_default();
        let mut frame = CallFrame::new(kind, from, to, input)
            .with_output(output.clone())
            .with_value(value)
            .with_gas(
                action.gas.map_or(0, |g| g.to::<u64>()),
                result.gas_used.map_or(0, |g| g.to::<u64>()),
            );
        if let Some(error) = self.error {
            frame.error = Some(error);
            if !output.is_empty() {
                frame.revert_data = Some(output);
            }
        }
        frame.code = result.code.filter(|c| !c.is_empty());
        frame
    }
}

/// Rebuild the call tree from a flat `trace_transaction` result.
pub fn build_tree(tx_hash: B256, mut traces: Vec<ParityTrace>) -> Result<CallFrame, TraceError> {
    // Lexicographic order of trace addresses is pre-order.
    traces.sort_by(|a, b| a.trace_address.cmp(&b.trace_address));
    let mut iter = traces.into_iter();

    let first = iter.next().ok_or(TraceError::EmptyTrace { tx_hash })?;
    if !first.trace_address.is_empty() {
        return Err(TraceError::malformed(format!(
            "first trace has address {:?}, expected root",
            first.trace_address
        )));
    }
    let mut root = first.into_frame();

    for trace in iter {
        let path = trace.trace_address.clone();
        let Some((last, parents)) = path.split_last() else {
            return Err(TraceError::malformed("more than one root trace"));
        };
        let mut node = &mut root;
        for &i in parents {
            node = node
                .children
                .get_mut(i)
                .ok_or_else(|| TraceError::malformed(format!("trace {path:?} has no parent")))?;
        }
        if *last != node.children.len() {
            return Err(TraceError::malformed(format!(
                "trace {path:?} out of sequence: parent has {} children",
                node.children.len()
            )));
        }
        node.children.push(trace.into_frame());
    }
    Ok(root)
}

/// Parse a raw `trace_transaction` result.
pub fn parse_parity_traces(tx_hash: B256, raw: Value) -> Result<CallFrame, TraceError> {
    if raw.is_null() {
        return Err(TraceError::EmptyTrace { tx_hash });
    }
    let traces: Vec<ParityTrace> = serde_json::from_value(raw)
        .map_err(|e| TraceError::malformed(format!("trace_transaction list: {e}")))?;
    build_tree(tx_hash, traces)
}

pub struct ParityTraceSource {
    eth: EthApi,
}

impl ParityTraceSource {
    pub fn new(eth: EthApi) -> Self {
        Self { eth }
    }
}

#[async_trait]
impl CallTraceSource for ParityTraceSource {
    fn name(&self) -> &'static str {
        "parity"
    }

    async fn trace(&self, tx_hash: B256) -> Result<CallFrame, TraceError> {
        let raw = self
            .eth
            .trace_transaction(tx_hash)
            .await
            .map_err(|e| TraceError::from_transport(TRACE_TRANSACTION_METHOD, e))?;
        parse_parity_traces(tx_hash, raw)
    }
}
