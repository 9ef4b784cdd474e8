//! Log decoding.
//!
//! `topics[0]` is the event selector; indexed parameters follow in
//! `topics[1..]` and non-indexed ones are ABI-encoded in `data`. Indexed
//! reference types (string, bytes, arrays, structs) are stored as their
//! keccak256 hash, so they come back as the raw 32-byte topic.
//!
//! The emitter's own ABI is searched first, then every known ABI. A
//! declaration only matches when its indexed-parameter count equals
//! `topics.len() - 1`, which separates e.g. ERC-20 and ERC-721 `Transfer`.

use alloy_core::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Event, JsonAbi};
use chaintrace_core::{DecodeError, DecodedEvent, DecodedField, Log, NormalizedValue};
use std::sync::Arc;

use crate::contract_map::ContractMap;
use crate::normalizer::normalize_with;
use crate::store::AbiStore;

pub struct EventDecoder {
    contracts: Arc<ContractMap>,
    store: Arc<AbiStore>,
}

impl EventDecoder {
    pub fn new(contracts: Arc<ContractMap>, store: Arc<AbiStore>) -> Self {
        Self { contracts, store }
    }

    /// Decode logs, preserving their order. Undecodable logs are kept as `unknown`.
    pub fn decode_logs(&self, logs: &[Log]) -> Vec<DecodedEvent> {
        logs.iter().map(|log| self.decode_log(log)).collect()
    }

    pub fn decode_log(&self, log: &Log) -> DecodedEvent {
        let Some(topic0) = log.topics.first() else {
            return DecodedEvent::unknown(log.clone());
        };
        let emitter = self.contracts.get(&log.address);

        let own = emitter
            .as_ref()
            .and_then(|d| find_event(&d.abi, topic0.0, log.topics.len()))
            .map(|ev| (ev.clone(), emitter.as_ref().map(|d| d.name.clone())));

        let matched = own.or_else(|| {
            self.store.artifacts().into_iter().find_map(|a| {
                find_event(&a.abi, topic0.0, log.topics.len())
                    .map(|ev| (ev.clone(), Some(a.name.clone())))
            })
        });

        let Some((event, declared_in)) = matched else {
            let mut unknown = DecodedEvent::unknown(log.clone());
            unknown.contract_name = emitter.map(|d| d.name.clone());
            return unknown;
        };

        let contract_name = emitter.map(|d| d.name.clone()).or(declared_in);
        match decode_event_fields(&event, log) {
            Ok(fields) => DecodedEvent {
                address: log.address,
                contract_name,
                name: event.name.clone(),
                signature: Some(event.signature()),
                fields,
                raw: log.clone(),
                decode_error: None,
            },
            Err(e) => {
                tracing::debug!(event = %event.name, address = %log.address, error = %e, "event data did not decode");
                DecodedEvent {
                    address: log.address,
                    contract_name,
                    name: event.name.clone(),
                    signature: Some(event.signature()),
                    fields: Vec::new(),
                    raw: log.clone(),
                    decode_error: Some(e.to_string()),
                }
            }
        }
    }
}

fn find_event(abi: &JsonAbi, topic0: [u8; 32], topic_count: usize) -> Option<&Event> {
    abi.events().find(|ev| {
        !ev.anonymous
            && ev.selector().0 == topic0
            && ev.inputs.iter().filter(|p| p.indexed).count() + 1 == topic_count
    })
}

/// Decode all fields of `log` against `event`, in declaration order.
pub fn decode_event_fields(event: &Event, log: &Log) -> Result<Vec<DecodedField>, DecodeError> {
    let resolve = |p: &alloy_json_abi::EventParam| {
        p.resolve().map_err(|e| DecodeError::AbiDecodeFailed {
            reason: format!("event param '{}': {e}", p.name),
        })
    };

    let body_types = event
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .map(resolve)
        .collect::<Result<Vec<_>, _>>()?;
    let mut body = match DynSolType::Tuple(body_types)
        .abi_decode_params(&log.data)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            reason: format!("event data: {e}"),
        })? {
        DynSolValue::Tuple(values) => values.into_iter(),
        other => vec![other].into_iter(),
    };

    let mut topics = log.topics.iter().skip(1);
    let mut fields = Vec::with_capacity(event.inputs.len());
    for (i, param) in event.inputs.iter().enumerate() {
        let name = if param.name.is_empty() {
            format!("arg{i}")
        } else {
            param.name.clone()
        };
        let value = if param.indexed {
            let topic = topics.next().ok_or_else(|| DecodeError::InvalidData {
                reason: format!("missing topic for indexed param '{name}'"),
            })?;
            let ty = resolve(param)?;
            if is_hashed_when_indexed(&ty) {
                NormalizedValue::Bytes(topic.to_vec())
            } else {
                let value = ty.abi_decode(topic.as_slice()).map_err(|e| DecodeError::AbiDecodeFailed {
                    reason: format!("topic '{name}': {e}"),
                })?;
                normalize_with(value, &param.components)
            }
        } else {
            let value = body.next().ok_or_else(|| DecodeError::InvalidData {
                reason: format!("missing data for param '{name}'"),
            })?;
            normalize_with(value, &param.components)
        };
        fields.push(DecodedField {
            name,
            value,
            indexed: param.indexed,
        });
    }
    Ok(fields)
}

fn is_hashed_when_indexed(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_map::ContractDeployment;
    use crate::store::ContractArtifact;
    use alloy_primitives::{b256, Address, Bytes, B256};

    const TOKEN_ABI: &str = r#"[
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[
            {"name":"from","type":"address","indexed":true},
            {"name":"to","type":"address","indexed":true},
            {"name":"value","type":"uint256","indexed":false}]},
        {"type":"event","name":"Note","anonymous":false,"inputs":[
            {"name":"tag","type":"string","indexed":true},
            {"name":"body","type":"string","indexed":false}]}
    ]"#;

    const TRANSFER_TOPIC: B256 =
        b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

    fn word_addr(a: Address) -> B256 {
        let mut w = [0u8; 32];
        w[12..].copy_from_slice(a.as_slice());
        B256::from(w)
    }

    fn transfer_log(emitter: Address, topics_extra: bool) -> Log {
        let mut topics = vec![
            TRANSFER_TOPIC,
            word_addr(Address::repeat_byte(0x11)),
            word_addr(Address::repeat_byte(0x22)),
        ];
        if topics_extra {
            topics.push(B256::repeat_byte(0x33));
        }
        let mut data = [0u8; 32];
        data[31] = 100;
        Log {
            address: emitter,
            topics,
            data: Bytes::copy_from_slice(&data),
            log_index: None,
            transaction_hash: None,
            block_number: None,
        }
    }

    fn setup() -> (EventDecoder, Address) {
        let store = Arc::new(AbiStore::new());
        let token = store.insert(ContractArtifact::from_abi_json("Token", TOKEN_ABI).unwrap());
        let contracts = Arc::new(ContractMap::new());
        let addr = Address::repeat_byte(0xaa);
        contracts.insert(ContractDeployment::new(addr, &token));
        (EventDecoder::new(contracts, store), addr)
    }

    #[test]
    fn decodes_erc20_transfer() {
        let (decoder, addr) = setup();
        let ev = decoder.decode_log(&transfer_log(addr, false));
        assert_eq!(ev.name, "Transfer");
        assert_eq!(ev.contract_name.as_deref(), Some("Token"));
        assert_eq!(ev.fields.len(), 3);
        assert!(ev.fields[0].indexed);
        assert_eq!(
            ev.field("to").and_then(|v| v.as_address()),
            Some(Address::repeat_byte(0x22).to_checksum(None).as_str())
        );
        assert_eq!(ev.field("value"), Some(&NormalizedValue::Uint(100)));
    }

    #[test]
    fn unregistered_emitter_matches_any_known_abi() {
        let (decoder, _) = setup();
        let ev = decoder.decode_log(&transfer_log(Address::repeat_byte(0xbb), false));
        assert_eq!(ev.name, "Transfer");
        assert_eq!(ev.contract_name.as_deref(), Some("Token"));
    }

    #[test]
    fn indexed_count_mismatch_is_unknown() {
        // ERC-721 style: tokenId indexed as a fourth topic.
        let (decoder, addr) = setup();
        let ev = decoder.decode_log(&transfer_log(addr, true));
        assert_eq!(ev.name, "unknown");
        assert!(!ev.is_decoded());
    }

    #[test]
    fn indexed_string_is_kept_as_hash() {
        let (decoder, addr) = setup();
        let note = crate::abi::keccak256(b"Note(string,string)");
        let tag_hash = crate::abi::keccak256(b"greeting");
        let data = crate::encoder::encode_params(
            &serde_json::from_str::<Vec<alloy_json_abi::Param>>(r#"[{"name":"body","type":"string"}]"#).unwrap(),
            &[NormalizedValue::Str("hello".into())],
        )
        .unwrap();
        let log = Log {
            address: addr,
            topics: vec![note, tag_hash],
            data: data.into(),
            log_index: None,
            transaction_hash: None,
            block_number: None,
        };
        let ev = decoder.decode_log(&log);
        assert_eq!(ev.name, "Note");
        assert_eq!(ev.field("tag"), Some(&NormalizedValue::Bytes(tag_hash.to_vec())));
        assert_eq!(ev.field("body"), Some(&NormalizedValue::Str("hello".into())));
    }

    #[test]
    fn log_without_topics_is_unknown() {
        let (decoder, addr) = setup();
        let mut log = transfer_log(addr, false);
        log.topics.clear();
        assert_eq!(decoder.decode_log(&log).name, "unknown");
    }

    #[test]
    fn bad_data_records_decode_error() {
        let (decoder, addr) = setup();
        let mut log = transfer_log(addr, false);
        log.data = Bytes::new();
        let ev = decoder.decode_log(&log);
        assert_eq!(ev.name, "Transfer");
        assert!(ev.decode_error.is_some());
    }
}
