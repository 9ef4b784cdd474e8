//! `eth_getTransactionByHash` / `eth_getTransactionReceipt` wire types.
//!
//! Only the fields the tracer and decoder read are modelled; anything else the
//! node returns is ignored on deserialisation.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};

use crate::frame::RawLog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract-creation transactions.
    #[serde(default)]
    pub to: Option<Address>,
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
    pub nonce: U64,
    pub gas: U64,
    #[serde(default)]
    pub block_number: Option<U64>,
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce.to::<u64>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    /// `0x1` success, `0x0` failure. Absent on pre-Byzantium receipts.
    #[serde(default)]
    pub status: Option<U64>,
    pub gas_used: U64,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |s| s != U64::ZERO)
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used.to::<u64>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub log_index: Option<U64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub block_number: Option<U64>,
}

impl From<RawLog> for Log {
    fn from(raw: RawLog) -> Self {
        Self {
            address: raw.address,
            topics: raw.topics,
            data: raw.data,
            log_index: None,
            transaction_hash: None,
            block_number: None,
        }
    }
}

impl From<&Log> for RawLog {
    fn from(log: &Log) -> Self {
        Self {
            address: log.address,
            topics: log.topics.clone(),
            data: log.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_from_node_json() {
        let json = serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x10",
            "from": "0x2222222222222222222222222222222222222222",
            "to": null,
            "status": "0x0",
            "gasUsed": "0x5208",
            "contractAddress": "0x3333333333333333333333333333333333333333",
            "cumulativeGasUsed": "0x5208",
            "logs": [{
                "address": "0x3333333333333333333333333333333333333333",
                "topics": [],
                "data": "0x",
                "logIndex": "0x0"
            }]
        });
        let receipt: TransactionReceipt = serde_json::from_value(json).unwrap();
        assert!(!receipt.is_success());
        assert_eq!(receipt.gas_used(), 21_000);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.contract_address, Some(Address::repeat_byte(0x33)));
    }

    #[test]
    fn missing_status_counts_as_success() {
        let json = serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "from": "0x2222222222222222222222222222222222222222",
            "gasUsed": "0x1",
        });
        let receipt: TransactionReceipt = serde_json::from_value(json).unwrap();
        assert!(receipt.is_success());
    }
}
