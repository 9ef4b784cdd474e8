//! Call frames: the node's view of a transaction's execution tree.
//!
//! A `CallFrame` is built once per traced transaction by the tracer and is
//! read-only afterwards. Children are stored in execution order.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The opcode that opened a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
    Unknown,
}

impl CallKind {
    /// Parse a tracer-reported frame type. Matching is case-insensitive.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "call" => Self::Call,
            "staticcall" => Self::StaticCall,
            "delegatecall" => Self::DelegateCall,
            "callcode" => Self::CallCode,
            "create" => Self::Create,
            "create2" => Self::Create2,
            "selfdestruct" | "suicide" => Self::SelfDestruct,
            _ => Self::Unknown,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Call => "CALL",
            Self::StaticCall => "STATICCALL",
            Self::DelegateCall => "DELEGATECALL",
            Self::CallCode => "CALLCODE",
            Self::Create => "CREATE",
            Self::Create2 => "CREATE2",
            Self::SelfDestruct => "SELFDESTRUCT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A log emitted inside a frame, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl RawLog {
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// One invocation in a transaction's call tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub kind: CallKind,
    pub from: Address,
    /// Callee, or the created contract for CREATE frames.
    pub to: Address,
    pub input: Bytes,
    pub output: Bytes,
    pub value: U256,
    pub gas: u64,
    pub gas_used: u64,
    /// Node-reported error string (`"execution reverted"`, `"out of gas"`, ...).
    pub error: Option<String>,
    /// Revert payload, when the frame reverted with data.
    pub revert_data: Option<Bytes>,
    /// Runtime code snapshot of `to`, when the tracer captured one.
    pub code: Option<Bytes>,
    pub code_hash: Option<B256>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
    #[serde(default)]
    pub children: Vec<CallFrame>,
}

impl CallFrame {
    /// A successful, empty frame of the given kind. Fill the rest with the builder methods.
    pub fn new(kind: CallKind, from: Address, to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            kind,
            from,
            to,
            input: input.into(),
            output: Bytes::new(),
            value: U256::ZERO,
            gas: 0,
            gas_used: 0,
            error: None,
            revert_data: None,
            code: None,
            code_hash: None,
            logs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<Bytes>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64, gas_used: u64) -> Self {
        self.gas = gas;
        self.gas_used = gas_used;
        self
    }

    /// Mark the frame as reverted with the given payload.
    pub fn with_revert(mut self, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        self.error = Some("execution reverted".into());
        self.output = data.clone();
        self.revert_data = Some(data);
        self
    }

    pub fn with_code(mut self, code: impl Into<Bytes>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_log(mut self, log: RawLog) -> Self {
        self.logs.push(log);
        self
    }

    pub fn with_child(mut self, child: CallFrame) -> Self {
        self.children.push(child);
        self
    }

    /// First four bytes of the input, when present.
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.kind.is_create() {
            return None;
        }
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }

    pub fn is_reverted(&self) -> bool {
        self.error.is_some()
    }

    /// Revert payload, falling back to the output of a failed frame.
    pub fn revert_payload(&self) -> Option<&Bytes> {
        if !self.is_reverted() {
            return None;
        }
        self.revert_data.as_ref().or(Some(&self.output))
    }

    /// Number of frames in this subtree, including `self`.
    pub fn frame_count(&self) -> usize {
        1 + self.children.iter().map(CallFrame::frame_count).sum::<usize>()
    }

    /// Depth-first, pre-order walk yielding `(depth, frame)`; the root is depth 0.
    pub fn walk(&self) -> FrameWalk<'_> {
        FrameWalk { stack: vec![(0, self)] }
    }
}

/// Iterator returned by [`CallFrame::walk`].
pub struct FrameWalk<'a> {
    stack: Vec<(usize, &'a CallFrame)>,
}

impl<'a> Iterator for FrameWalk<'a> {
    type Item = (usize, &'a CallFrame);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, frame) = self.stack.pop()?;
        for child in frame.children.iter().rev() {
            self.stack.push((depth + 1, child));
        }
        Some((depth, frame))
    }
}
