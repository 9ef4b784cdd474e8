//! End-to-end client tests over a scripted JSON-RPC transport.
//!
//! Each test scripts the node's answers on a `MockTransport`, drives the
//! client through submit → receipt → trace → decode, and checks the decoded
//! transaction or the nonce manager state.

use std::collections::HashSet;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use chaintrace_client::{ClientConfig, ClientError, TraceClient, TracingMode};
use chaintrace_core::{AbiMatchKind, NormalizedValue, RevertReason, SigningKey};
use chaintrace_evm::{ContractArtifact, EvmEncoder};
use chaintrace_rpc::mock::MockTransport;
use chaintrace_trace::TraceError;
use serde_json::{json, Value};

// ─── Fixtures ────────────────────────────────────────────────────────────────

const VAULT_ABI: &str = r#"[
    {"type":"function","name":"withdraw","stateMutability":"nonpayable",
     "inputs":[{"name":"amount","type":"uint256"}],"outputs":[]},
    {"type":"event","name":"Withdrawn","anonymous":false,"inputs":[
        {"name":"who","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false}]},
    {"type":"error","name":"CustomErr","inputs":[
        {"name":"available","type":"uint256"},{"name":"required","type":"uint256"}]}
]"#;

const CLONE_ABI: &str = r#"[
    {"type":"function","name":"ping","stateMutability":"view","inputs":[],"outputs":[]}
]"#;

const CLONE_CREATION: [u8; 4] = [0x60, 0x0a, 0x60, 0x0c];
const CLONE_RUNTIME: [u8; 3] = [0x60, 0x80, 0xfe];

fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

fn vault() -> Address {
    Address::repeat_byte(0x7a)
}

fn clone_addr() -> Address {
    Address::repeat_byte(0xc1)
}

fn tx_hash() -> B256 {
    B256::repeat_byte(0x42)
}

fn config(mode: TracingMode) -> ClientConfig {
    let mut config = ClientConfig::new("mock://");
    config.tracing.mode = mode;
    config.retry.max_retries = 0;
    config.receipt.poll_interval_ms = 5;
    config.receipt.timeout_ms = 2_000;
    config
}

fn client(mock: &Arc<MockTransport>, config: ClientConfig) -> TraceClient {
    let client = TraceClient::new(
        config,
        mock.clone(),
        vec![SigningKey::new(alice(), vec![0x01; 32])],
    )
    .unwrap();
    client.register_artifact(ContractArtifact::from_abi_json("Vault", VAULT_ABI).unwrap());
    client.register_artifact(
        ContractArtifact::from_abi_json("Clone", CLONE_ABI)
            .unwrap()
            .with_bytecode(CLONE_CREATION.to_vec())
            .with_deployed_bytecode(CLONE_RUNTIME.to_vec()),
    );
    client.register_deployment(vault(), "Vault").unwrap();
    client
}

fn vault_encoder(client: &TraceClient) -> EvmEncoder {
    EvmEncoder::new(Arc::clone(&client.abi_store().get("Vault").unwrap().abi))
}

fn withdraw_calldata(client: &TraceClient, amount: u128) -> Bytes {
    vault_encoder(client)
        .encode_call("withdraw", &[NormalizedValue::Uint(amount)])
        .unwrap()
        .into()
}

fn custom_err(client: &TraceClient) -> Bytes {
    vault_encoder(client)
        .encode_error("CustomErr", &[NormalizedValue::Uint(100), NormalizedValue::Uint(500)])
        .unwrap()
        .into()
}

fn tx_json(input: &Bytes) -> Value {
    json!({
        "hash": tx_hash(),
        "from": alice(),
        "to": vault(),
        "input": input,
        "value": "0x0",
        "nonce": "0x7",
        "gas": "0x7a120",
        "blockNumber": "0x1"
    })
}

fn receipt_json(success: bool, logs: Value) -> Value {
    json!({
        "transactionHash": tx_hash(),
        "blockNumber": "0x1",
        "from": alice(),
        "to": vault(),
        "status": if success { "0x1" } else { "0x0" },
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": logs
    })
}

fn withdrawn_log(amount: u64) -> Value {
    let topic0 = chaintrace_evm::abi::keccak256(b"Withdrawn(address,uint256)");
    let data = Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec());
    json!({
        "address": vault(),
        "topics": [topic0, alice().into_word()],
        "data": data,
        "logIndex": "0x0"
    })
}

// ─── Decoding ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reverted_transaction_is_traced_and_decoded() {
    let mock = Arc::new(MockTransport::new());
    let client = client(&mock, config(TracingMode::Reverted));

    let input = withdraw_calldata(&client, 500);
    let revert = custom_err(&client);
    let ping: Bytes = EvmEncoder::new(Arc::clone(&client.abi_store().get("Clone").unwrap().abi))
        .encode_call("ping", &[])
        .unwrap()
        .into();

    mock.on("eth_sendRawTransaction", json!(tx_hash()));
    mock.push("eth_getTransactionReceipt", Value::Null);
    mock.on("eth_getTransactionReceipt", receipt_json(false, json!([])));
    mock.on("eth_getTransactionByHash", tx_json(&input));
    mock.on("eth_getCode", json!("0x"));
    mock.on(
        "debug_traceTransaction",
        json!({
            "type": "CALL", "from": alice(), "to": vault(), "value": "0x0",
            "gas": "0x7a120", "gasUsed": "0x5208",
            "input": input, "output": revert, "error": "execution reverted",
            "calls": [
                {
                    "type": "CREATE2", "from": vault(), "to": clone_addr(), "value": "0x0",
                    "gas": "0x100", "gasUsed": "0x10",
                    "input": Bytes::from(CLONE_CREATION.to_vec()),
                    "output": Bytes::from(CLONE_RUNTIME.to_vec())
                },
                {
                    "type": "STATICCALL", "from": vault(), "to": clone_addr(),
                    "gas": "0x100", "gasUsed": "0x10",
                    "input": ping, "output": revert, "error": "execution reverted"
                }
            ]
        }),
    );

    let decoded = client.submit_and_decode(&[0xf8, 0x6b]).await.unwrap();

    assert!(decoded.is_reverted());
    assert_eq!(decoded.root.method, "withdraw");
    assert_eq!(decoded.root.input("amount"), Some(&NormalizedValue::Uint(500)));
    assert_eq!(decoded.root.contract_name.as_deref(), Some("Vault"));
    assert_eq!(decoded.root.children.len(), 2);

    // Contract created inside the transaction is discovered from its runtime code.
    let created = &decoded.root.children[0];
    assert_eq!(created.method, "constructor");
    assert_eq!(created.contract_name.as_deref(), Some("Clone"));
    assert_eq!(created.abi_match, AbiMatchKind::Bytecode);
    assert!(client.contract_map().contains(&clone_addr()));

    let pinged = &decoded.root.children[1];
    assert_eq!(pinged.method, "ping");
    assert_eq!(pinged.abi_match, AbiMatchKind::Address);

    // Clone's ABI does not declare CustomErr; it is found through Vault's.
    let reason = decoded.revert_reason().unwrap();
    assert!(matches!(reason, RevertReason::CustomError { name, .. } if name == "CustomErr"));
    assert_eq!(reason.arg("available"), Some(&NormalizedValue::Uint(100)));
    assert_eq!(reason.arg("required"), Some(&NormalizedValue::Uint(500)));

    assert!(mock.calls("eth_getTransactionReceipt") >= 2);
    assert!(client.decoded(&tx_hash()).is_some());
    assert!(client.tracer().cached(&tx_hash()).is_some());
    assert_eq!(client.address_label(&clone_addr()), "Clone");
    assert_eq!(client.address_label(&alice()), "you");
}

#[tokio::test]
async fn successful_transaction_is_not_traced_in_reverted_mode() {
    let mock = Arc::new(MockTransport::new());
    let client = client(&mock, config(TracingMode::Reverted));
    let input = withdraw_calldata(&client, 250);

    mock.on("eth_getTransactionByHash", tx_json(&input));
    mock.on("eth_getTransactionReceipt", receipt_json(true, json!([withdrawn_log(250)])));

    let decoded = client.decode(tx_hash()).await.unwrap();
    assert!(!decoded.is_reverted());
    assert_eq!(decoded.root.method, "withdraw");
    assert!(decoded.root.children.is_empty());
    assert_eq!(mock.calls("debug_traceTransaction"), 0);

    let events: Vec<_> = decoded.events_named("Withdrawn").collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].contract_name.as_deref(), Some("Vault"));
    assert_eq!(events[0].field("amount"), Some(&NormalizedValue::Uint(250)));
    assert_eq!(
        events[0].field("who").and_then(|v| v.as_address()),
        Some(alice().to_checksum(None).as_str())
    );
}

#[tokio::test]
async fn trace_failure_is_reported_and_untraced_decode_still_works() {
    let mock = Arc::new(MockTransport::new());
    let client = client(&mock, config(TracingMode::All));
    let input = withdraw_calldata(&client, 1);

    mock.on("eth_getTransactionByHash", tx_json(&input));
    mock.on("eth_getTransactionReceipt", receipt_json(true, json!([])));
    // Neither debug_traceTransaction nor trace_transaction is scripted.

    let err = client.decode(tx_hash()).await.unwrap_err();
    assert!(matches!(err, ClientError::Trace(TraceError::Unsupported { .. })));

    let decoded = client.decode_untraced(tx_hash()).await.unwrap();
    assert_eq!(decoded.root.method, "withdraw");
}

#[tokio::test]
async fn missing_transaction_is_not_found() {
    let mock = Arc::new(MockTransport::new());
    let client = client(&mock, config(TracingMode::None));
    mock.on("eth_getTransactionByHash", Value::Null);
    assert!(matches!(
        client.decode(tx_hash()).await,
        Err(ClientError::TransactionNotFound { .. })
    ));
}

#[tokio::test]
async fn receipt_wait_times_out() {
    let mock = Arc::new(MockTransport::new());
    let mut cfg = config(TracingMode::None);
    cfg.receipt.timeout_ms = 40;
    let client = client(&mock, cfg);
    mock.on("eth_getTransactionReceipt", Value::Null);

    assert!(matches!(
        client.wait_for_receipt(tx_hash()).await,
        Err(ClientError::ReceiptTimeout { ms: 40, .. })
    ));
}

// ─── Nonces ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_workers_get_unique_nonces() {
    let mock = Arc::new(MockTransport::new());
    mock.on("eth_getTransactionCount", json!("0x7"));
    let client = Arc::new(client(&mock, config(TracingMode::None)));

    let workers: Vec<_> = (0..50)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.next_nonce(alice()).await.unwrap() })
        })
        .collect();
    let mut nonces = HashSet::new();
    for w in workers {
        assert!(nonces.insert(w.await.unwrap()));
    }
    assert_eq!(nonces, (7..57).collect::<HashSet<u64>>());
    // Seeded once, then served from memory.
    assert_eq!(mock.calls("eth_getTransactionCount"), 1);
}

#[tokio::test]
async fn resync_only_moves_forward() {
    let mock = Arc::new(MockTransport::new());
    mock.push("eth_getTransactionCount", json!("0x2"));
    let client = client(&mock, config(TracingMode::None));
    assert_eq!(client.next_nonce(alice()).await.unwrap(), 2);
    assert_eq!(client.next_nonce(alice()).await.unwrap(), 3);

    // Chain has not seen nonces 2 and 3 yet.
    mock.push("eth_getTransactionCount", json!("0x2"));
    client.update_nonces().await.unwrap();
    assert_eq!(client.nonce_manager().peek(alice()).await, Some(4));

    // Someone else used the key.
    mock.push("eth_getTransactionCount", json!("0x64"));
    client.update_nonces().await.unwrap();
    assert_eq!(client.next_nonce(alice()).await.unwrap(), 100);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn deployments_persist_across_clients() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(TracingMode::None);
    cfg.contract_map_file = Some(dir.path().join("deployed_contracts_mock_1337.toml"));

    let mock = Arc::new(MockTransport::new());
    let first = client(&mock, cfg.clone());
    assert!(first.register_deployment(clone_addr(), "Clone").unwrap());
    assert!(!first.register_deployment(clone_addr(), "Vault").unwrap());
    assert!(matches!(
        first.register_deployment(Address::repeat_byte(9), "Missing"),
        Err(ClientError::UnknownArtifact { .. })
    ));

    let second = TraceClient::new(cfg, mock.clone(), vec![]).unwrap();
    second.register_artifact(ContractArtifact::from_abi_json("Vault", VAULT_ABI).unwrap());
    second.register_artifact(ContractArtifact::from_abi_json("Clone", CLONE_ABI).unwrap());
    assert_eq!(second.restore_contract_map().unwrap(), 2);
    assert_eq!(second.contract_map().name_of(&clone_addr()).as_deref(), Some("Clone"));
    assert_eq!(second.address_label(&vault()), "Vault");
    assert_eq!(second.address_label(&Address::repeat_byte(0xee)), "unknown");
}

#[tokio::test]
async fn concurrent_registrations_all_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(TracingMode::None);
    cfg.contract_map_file = Some(dir.path().join("deployed_contracts_mock_1337.toml"));

    let mock = Arc::new(MockTransport::new());
    let first = client(&mock, cfg.clone());
    std::thread::scope(|scope| {
        for i in 0..16u8 {
            let first = &first;
            scope.spawn(move || {
                assert!(first.register_deployment(Address::repeat_byte(0x40 + i), "Vault").unwrap());
            });
        }
    });

    // The sixteen plus the vault registered by `client`.
    let second = TraceClient::new(cfg, mock.clone(), vec![]).unwrap();
    second.register_artifact(ContractArtifact::from_abi_json("Vault", VAULT_ABI).unwrap());
    assert_eq!(second.restore_contract_map().unwrap(), 17);
}

#[tokio::test]
async fn failed_save_does_not_register() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(TracingMode::None);
    cfg.contract_map_file = Some(dir.path().join("gone").join("contracts.toml"));

    let mock = Arc::new(MockTransport::new());
    let client = TraceClient::new(cfg, mock.clone(), vec![]).unwrap();
    client.register_artifact(ContractArtifact::from_abi_json("Vault", VAULT_ABI).unwrap());
    let addr = Address::repeat_byte(0x77);
    assert!(matches!(
        client.register_deployment(addr, "Vault"),
        Err(ClientError::ContractMap(_))
    ));
    assert!(client.contract_map().name_of(&addr).is_none());

    std::fs::create_dir(dir.path().join("gone")).unwrap();
    assert!(client.register_deployment(addr, "Vault").unwrap());
}

#[tokio::test]
async fn decoded_transactions_saved_as_json() {
    let mock = Arc::new(MockTransport::new());
    let client = client(&mock, config(TracingMode::None));
    let input = withdraw_calldata(&client, 9);
    mock.on("eth_getTransactionByHash", tx_json(&input));
    mock.on("eth_getTransactionReceipt", receipt_json(true, json!([])));
    client.decode(tx_hash()).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(client.save_decoded_as_json(dir.path()).unwrap(), 1);

    let path = dir.path().join(format!("{}.json", tx_hash()));
    let saved: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(saved["root"]["method"], "withdraw");
}
