//! `TransactionDecoder`: turns a call-frame tree plus receipt into a
//! [`DecodedTransaction`].
//!
//! Each frame goes `Pending → AbiResolved | AbiUnresolved → Decoded`. A frame
//! that cannot be decoded (no ABI, unknown selector, malformed calldata)
//! degrades to raw bytes and a comment; it never stops its parent or
//! siblings from being decoded, so the decoded tree always mirrors the trace.

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use chaintrace_core::{
    AbiMatchKind, CallFrame, CallKind, DecodeState, DecodedCall, DecodedEvent, DecodedTransaction,
    Log, Transaction, TransactionReceipt, UNKNOWN,
};
use std::sync::Arc;

use crate::abi::{decode_inputs, decode_outputs, decode_params, find_function};
use crate::contract_map::ContractMap;
use crate::event::EventDecoder;
use crate::finder::{AbiFinder, AbiMatch};
use crate::revert::RevertDecoder;
use crate::store::AbiStore;

pub struct TransactionDecoder {
    finder: AbiFinder,
    events: EventDecoder,
    reverts: RevertDecoder,
}

impl TransactionDecoder {
    pub fn new(contracts: Arc<ContractMap>, store: Arc<AbiStore>) -> Self {
        Self::with_finder(AbiFinder::new(contracts, store))
    }

    pub fn with_finder(finder: AbiFinder) -> Self {
        let contracts = Arc::clone(finder.contracts());
        let store = Arc::clone(finder.store());
        Self {
            events: EventDecoder::new(contracts, Arc::clone(&store)),
            reverts: RevertDecoder::new(store),
            finder,
        }
    }

    pub fn finder(&self) -> &AbiFinder {
        &self.finder
    }

    /// Decode a traced transaction.
    pub fn decode(
        &self,
        tx: &Transaction,
        receipt: &TransactionReceipt,
        frame: &CallFrame,
    ) -> DecodedTransaction {
        let root = self.decode_frame(frame);
        let events = self.decode_logs(&receipt.logs);
        DecodedTransaction {
            transaction: tx.clone(),
            receipt: receipt.clone(),
            root,
            events,
        }
    }

    /// Decode a transaction without a trace: the root call is rebuilt from
    /// the transaction and receipt, and has no children. Receipt logs are
    /// reported at the transaction level only.
    pub fn decode_untraced(&self, tx: &Transaction, receipt: &TransactionReceipt) -> DecodedTransaction {
        let frame = root_frame_from_tx(tx, receipt);
        self.decode(tx, receipt, &frame)
    }

    pub fn decode_logs(&self, logs: &[Log]) -> Vec<DecodedEvent> {
        self.events.decode_logs(logs)
    }

    /// Decode `frame` and, recursively, all of its children.
    pub fn decode_frame(&self, frame: &CallFrame) -> DecodedCall {
        let mut call = DecodedCall {
            kind: frame.kind,
            from: frame.from,
            to: frame.to,
            contract_name: None,
            method: UNKNOWN.to_string(),
            signature: None,
            selector: frame.selector(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            raw_input: frame.input.clone(),
            raw_output: frame.output.clone(),
            value: frame.value,
            gas: frame.gas,
            gas_used: frame.gas_used,
            error: frame.error.clone(),
            revert: None,
            events: Vec::new(),
            abi_match: AbiMatchKind::Unresolved,
            state: DecodeState::Pending,
            comment: None,
            children: Vec::new(),
        };

        let matched = self.finder.find_frame(frame);
        call.abi_match = matched.kind();
        call.state = match matched {
            AbiMatch::Found { .. } => DecodeState::AbiResolved,
            AbiMatch::Unresolved => DecodeState::AbiUnresolved,
        };

        let abi: Option<Arc<JsonAbi>> = matched.deployment().map(|d| Arc::clone(&d.abi));
        match matched.deployment() {
            Some(deployment) => {
                call.contract_name = Some(deployment.name.clone());
                self.decode_body(frame, &deployment.abi, &mut call);
                if let AbiMatchKind::Selector { duplicates } = call.abi_match {
                    if duplicates > 0 {
                        call.comment = Some(format!(
                            "potentially inaccurate: selector declared by {duplicates} other known contract(s)"
                        ));
                    }
                }
            }
            None => {
                call.comment = Some("call not decoded: no ABI known for this address".into());
            }
        }

        if let Some(payload) = frame.revert_payload() {
            call.revert = Some(self.reverts.decode(payload, abi.as_deref()));
        }

        if !frame.logs.is_empty() {
            let logs: Vec<Log> = frame.logs.iter().cloned().map(Log::from).collect();
            call.events = self.decode_logs(&logs);
        }

        call.children = frame.children.iter().map(|c| self.decode_frame(c)).collect();
        call.state = DecodeState::Decoded;
        call
    }

    fn decode_body(&self, frame: &CallFrame, abi: &JsonAbi, call: &mut DecodedCall) {
        if frame.kind.is_create() {
            call.method = "constructor".into();
            self.decode_constructor(frame, abi, call);
            return;
        }

        let Some(selector) = frame.selector() else {
            if frame.input.is_empty() {
                if abi.receive.is_some() && !frame.value.is_zero() {
                    call.method = "receive".into();
                } else if abi.fallback.is_some() {
                    call.method = "fallback".into();
                }
            } else if abi.fallback.is_some() {
                call.method = "fallback".into();
            }
            return;
        };

        let Some(func) = find_function(abi, selector) else {
            if abi.fallback.is_some() {
                call.method = "fallback".into();
            }
            call.comment = Some(format!(
                "selector 0x{} not declared in {}",
                hex::encode(selector),
                call.contract_name.as_deref().unwrap_or("contract")
            ));
            return;
        };

        call.method = func.name.clone();
        call.signature = Some(func.signature());

        match decode_inputs(func, &frame.input) {
            Ok(inputs) => call.inputs = inputs,
            Err(e) => {
                tracing::debug!(method = %func.name, to = %frame.to, error = %e, "calldata did not decode");
                call.comment = Some(format!("inputs not decoded: {e}"));
            }
        }

        if !frame.is_reverted() && !frame.output.is_empty() {
            match decode_outputs(func, &frame.output) {
                Ok(outputs) => call.outputs = outputs,
                Err(e) => {
                    tracing::debug!(method = %func.name, to = %frame.to, error = %e, "return data did not decode");
                    call.comment = Some(format!("outputs not decoded: {e}"));
                }
            }
        }
    }

    /// Constructor args follow the creation code in the init code.
    fn decode_constructor(&self, frame: &CallFrame, abi: &JsonAbi, call: &mut DecodedCall) {
        let Some(ctor) = abi.constructor.as_ref() else {
            return;
        };
        let Some(name) = call.contract_name.as_deref() else {
            return;
        };
        let Some(artifact) = self.finder.store().get(name) else {
            return;
        };
        let Some(code) = artifact.bytecode.as_ref() else {
            return;
        };
        let Some(args) = frame.input.get(code.len()..) else {
            return;
        };
        match decode_params(args, &ctor.inputs, "arg") {
            Ok(inputs) => call.inputs = inputs,
            Err(e) => call.comment = Some(format!("constructor args not decoded: {e}")),
        }
    }
}

fn root_frame_from_tx(tx: &Transaction, receipt: &TransactionReceipt) -> CallFrame {
    let (kind, to) = match tx.to {
        Some(to) => (CallKind::Call, to),
        None => (
            CallKind::Create,
            receipt.contract_address.unwrap_or(Address::ZERO),
        ),
    };
    let mut frame = CallFrame::new(kind, tx.from, to, tx.input.clone())
        .with_value(tx.value)
        .with_gas(tx.gas.to::<u64>(), receipt.gas_used());
    if !receipt.is_success() {
        frame.error = Some("execution reverted".into());
    }
    frame
}
