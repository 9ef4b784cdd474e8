//! Decoded views of call frames, logs and whole transactions.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::CallKind;
use crate::tx::{Log, Transaction, TransactionReceipt};
use crate::types::NormalizedValue;

/// Method or event name used when no ABI entry could be matched.
pub const UNKNOWN: &str = "unknown";

// ─── ABI match ────────────────────────────────────────────────────────────────

/// How the ABI used for a frame was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum AbiMatchKind {
    /// Address registered in the contract map.
    Address,
    /// Runtime or creation code matched a known artifact.
    Bytecode,
    /// EIP-1167 clone of a registered implementation.
    Proxy,
    /// Function selector found in a known ABI. `duplicates` counts the other
    /// ABIs that declare the same selector.
    Selector { duplicates: usize },
    Unresolved,
}

impl AbiMatchKind {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// Per-frame decoding progress. Every frame ends in `Decoded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeState {
    Pending,
    AbiResolved,
    AbiUnresolved,
    Decoded,
}

// ─── RevertReason ─────────────────────────────────────────────────────────────

/// Why a frame reverted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevertReason {
    /// `require(cond, "message")` / `revert("message")`.
    ErrorString { message: String },

    /// A declared custom error with its decoded arguments.
    CustomError {
        name: String,
        args: Vec<(String, NormalizedValue)>,
    },

    /// `Panic(uint256)` raised by the compiler.
    Panic { code: u64, meaning: String },

    /// Revert data matching no known format.
    Raw {
        selector: Option<[u8; 4]>,
        data: Bytes,
    },

    /// Reverted without data.
    Empty,
}

impl RevertReason {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::ErrorString { message } => Some(message),
            _ => None,
        }
    }

    pub fn arg(&self, name: &str) -> Option<&NormalizedValue> {
        match self {
            Self::CustomError { args, .. } => args.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorString { message } => write!(f, "reverted: {message}"),
            Self::CustomError { name, args } => {
                let args: Vec<_> = args.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Self::Panic { code, meaning } => write!(f, "panic 0x{code:02x}: {meaning}"),
            Self::Raw { selector: Some(sel), .. } => {
                write!(f, "raw revert (selector 0x{})", hex::encode(sel))
            }
            Self::Raw { data, .. } => write!(f, "raw revert 0x{}", hex::encode(data)),
            Self::Empty => write!(f, "empty revert"),
        }
    }
}

// ─── DecodedEvent ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedField {
    pub name: String,
    pub value: NormalizedValue,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub address: Address,
    pub contract_name: Option<String>,
    /// Event name, or [`UNKNOWN`].
    pub name: String,
    pub signature: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<DecodedField>,
    pub raw: Log,
    /// Set when a matching declaration was found but its data did not decode.
    pub decode_error: Option<String>,
}

impl DecodedEvent {
    /// An event for a log no ABI could explain.
    pub fn unknown(log: Log) -> Self {
        Self {
            address: log.address,
            contract_name: None,
            name: UNKNOWN.into(),
            signature: None,
            fields: Vec::new(),
            raw: log,
            decode_error: None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        self.name != UNKNOWN && self.decode_error.is_none()
    }

    pub fn field(&self, name: &str) -> Option<&NormalizedValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

// ─── DecodedCall ──────────────────────────────────────────────────────────────

/// The decoded form of one call frame.
///
/// Produced for every frame, resolved or not. Unresolved frames keep
/// `method == "unknown"` and carry their raw input and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedCall {
    pub kind: CallKind,
    pub from: Address,
    pub to: Address,
    pub contract_name: Option<String>,
    pub method: String,
    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub signature: Option<String>,
    pub selector: Option<[u8; 4]>,
    pub inputs: Vec<(String, NormalizedValue)>,
    pub outputs: Vec<(String, NormalizedValue)>,
    pub raw_input: Bytes,
    pub raw_output: Bytes,
    pub value: U256,
    pub gas: u64,
    pub gas_used: u64,
    /// Node-reported error string.
    pub error: Option<String>,
    pub revert: Option<RevertReason>,
    /// Logs emitted directly by this frame, when the tracer reported them.
    pub events: Vec<DecodedEvent>,
    pub abi_match: AbiMatchKind,
    pub state: DecodeState,
    pub comment: Option<String>,
    pub children: Vec<DecodedCall>,
}

impl DecodedCall {
    pub fn is_resolved(&self) -> bool {
        self.abi_match.is_resolved()
    }

    pub fn is_reverted(&self) -> bool {
        self.error.is_some()
    }

    pub fn input(&self, name: &str) -> Option<&NormalizedValue> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn output(&self, name: &str) -> Option<&NormalizedValue> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn selector_hex(&self) -> Option<String> {
        self.selector.map(|s| format!("0x{}", hex::encode(s)))
    }

    /// `Name.method(arg=value, ...)`, or the raw selector for unresolved frames.
    pub fn summary(&self) -> String {
        let target = self
            .contract_name
            .clone()
            .unwrap_or_else(|| format!("{:#x}", self.to));
        if !self.is_resolved() || self.method == UNKNOWN {
            let sel = self.selector_hex().unwrap_or_else(|| "0x".into());
            return format!("{target}.{UNKNOWN}[{sel}]");
        }
        let args: Vec<_> = self.inputs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{target}.{}({})", self.method, args.join(", "))
    }

    /// Depth-first, pre-order iteration over this call and its descendants.
    pub fn iter(&self) -> CallIter<'_> {
        CallIter { stack: vec![(0, self)] }
    }
}

/// Iterator returned by [`DecodedCall::iter`]; yields `(depth, call)`.
pub struct CallIter<'a> {
    stack: Vec<(usize, &'a DecodedCall)>,
}

impl<'a> Iterator for CallIter<'a> {
    type Item = (usize, &'a DecodedCall);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, call) = self.stack.pop()?;
        for child in call.children.iter().rev() {
            self.stack.push((depth + 1, child));
        }
        Some((depth, call))
    }
}

// ─── DecodedTransaction ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub transaction: Transaction,
    pub receipt: TransactionReceipt,
    pub root: DecodedCall,
    /// Receipt logs, decoded, in log order.
    pub events: Vec<DecodedEvent>,
}

impl DecodedTransaction {
    pub fn hash(&self) -> B256 {
        self.transaction.hash
    }

    pub fn is_reverted(&self) -> bool {
        !self.receipt.is_success() || self.root.is_reverted()
    }

    /// Every call in execution order with its nesting depth.
    pub fn calls(&self) -> CallIter<'_> {
        self.root.iter()
    }

    /// First call (in execution order) to `method`.
    pub fn find_call(&self, method: &str) -> Option<&DecodedCall> {
        self.calls().map(|(_, c)| c).find(|c| c.method == method)
    }

    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DecodedEvent> + 'a {
        self.events.iter().filter(move |e| e.name == name)
    }

    /// The revert reason of the deepest reverted frame on the first failing path.
    pub fn revert_reason(&self) -> Option<&RevertReason> {
        let mut current = &self.root;
        current.revert.as_ref()?;
        while let Some(child) = current.children.iter().find(|c| c.revert.is_some()) {
            current = child;
        }
        current.revert.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, children: Vec<DecodedCall>) -> DecodedCall {
        DecodedCall {
            kind: CallKind::Call,
            from: Address::ZERO,
            to: Address::repeat_byte(0x11),
            contract_name: Some("Vault".into()),
            method: method.into(),
            signature: None,
            selector: Some([0xde, 0xad, 0xbe, 0xef]),
            inputs: vec![("amount".into(), NormalizedValue::Uint(5))],
            outputs: vec![],
            raw_input: Bytes::new(),
            raw_output: Bytes::new(),
            value: U256::ZERO,
            gas: 0,
            gas_used: 0,
            error: None,
            revert: None,
            events: vec![],
            abi_match: AbiMatchKind::Address,
            state: DecodeState::Decoded,
            comment: None,
            children,
        }
    }

    #[test]
    fn summary_resolved() {
        assert_eq!(call("deposit", vec![]).summary(), "Vault.deposit(amount=5)");
    }

    #[test]
    fn summary_unresolved_shows_selector() {
        let mut c = call(UNKNOWN, vec![]);
        c.abi_match = AbiMatchKind::Unresolved;
        c.contract_name = None;
        assert!(c.summary().ends_with(".unknown[0xdeadbeef]"));
    }

    #[test]
    fn iter_reports_depth() {
        let root = call("a", vec![call("b", vec![call("c", vec![])]), call("d", vec![])]);
        let seen: Vec<_> = root.iter().map(|(d, c)| (d, c.method.as_str())).collect();
        assert_eq!(seen, vec![(0, "a"), (1, "b"), (2, "c"), (1, "d")]);
    }

    #[test]
    fn revert_display() {
        let r = RevertReason::CustomError {
            name: "CustomErr".into(),
            args: vec![
                ("available".into(), NormalizedValue::Uint(1)),
                ("required".into(), NormalizedValue::Uint(2)),
            ],
        };
        assert_eq!(r.to_string(), "CustomErr(available=1, required=2)");
        assert_eq!(r.arg("required"), Some(&NormalizedValue::Uint(2)));
        let p = RevertReason::Panic { code: 0x11, meaning: "arithmetic overflow or underflow".into() };
        assert_eq!(p.to_string(), "panic 0x11: arithmetic overflow or underflow");
    }
}
