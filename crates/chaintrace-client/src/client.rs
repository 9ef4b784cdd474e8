//! `TraceClient`: submit, wait, trace, decode.
//!
//! ```text
//! submit_raw ──► wait_for_receipt ──► [Tracer::trace] ──► TransactionDecoder ──► DecodedTransaction
//!                                       (per TracingMode)
//! ```
//!
//! One client is shared by many concurrent workers. Nonce allocation is
//! serialised per address inside the [`NonceManager`]; traces and decodes
//! for different transactions run independently and only share the
//! append-only [`ContractMap`].

use alloy_primitives::{Address, B256};
use chaintrace_core::{DecodeError, DecodedTransaction, SigningKey, TransactionReceipt, UNKNOWN};
use chaintrace_evm::{
    AbiFinder, AbiStore, ContractArtifact, ContractDeployment, ContractMap, TransactionDecoder,
};
use chaintrace_rpc::{EthApi, HttpRpcClient, RpcTransport};
use chaintrace_trace::Tracer;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::config::{ClientConfig, TracingMode};
use crate::error::ClientError;
use crate::nonce::NonceManager;

pub struct TraceClient {
    config: ClientConfig,
    eth: EthApi,
    keys: Vec<SigningKey>,
    nonces: NonceManager,
    store: Arc<AbiStore>,
    contracts: Arc<ContractMap>,
    tracer: Tracer,
    decoder: TransactionDecoder,
    decoded: RwLock<HashMap<B256, Arc<DecodedTransaction>>>,
}

impl TraceClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn RpcTransport>,
        keys: Vec<SigningKey>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let eth = EthApi::new(transport, config.request_timeout());
        let store = Arc::new(AbiStore::new());
        let contracts = Arc::new(ContractMap::new());

        let nonces = NonceManager::new(
            Arc::new(eth.clone()),
            keys.iter().map(SigningKey::address),
            Duration::from_millis(config.nonce.sync_timeout_ms),
        );
        let tracer = Tracer::new(eth.clone(), config.tracer_config())
            .with_contract_map(Arc::clone(&contracts));
        let finder = AbiFinder::new(Arc::clone(&contracts), Arc::clone(&store))
            .with_selector_fallback(config.tracing.selector_fallback);

        tracing::debug!(
            rpc_url = %config.rpc_url,
            keys = keys.len(),
            mode = ?config.tracing.mode,
            "trace client created"
        );
        Ok(Self {
            eth,
            keys,
            nonces,
            decoder: TransactionDecoder::with_finder(finder),
            tracer,
            store,
            contracts,
            config,
            decoded: RwLock::new(HashMap::new()),
        })
    }

    /// Client over HTTP, retrying transient failures per `config.retry`.
    pub fn connect(config: ClientConfig, keys: Vec<SigningKey>) -> Result<Self, ClientError> {
        let http = HttpRpcClient::new(config.rpc_url.clone(), config.http_config())?;
        Self::new(config, Arc::new(http), keys)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn eth(&self) -> &EthApi {
        &self.eth
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn nonce_manager(&self) -> &NonceManager {
        &self.nonces
    }

    pub fn contract_map(&self) -> &Arc<ContractMap> {
        &self.contracts
    }

    pub fn abi_store(&self) -> &Arc<AbiStore> {
        &self.store
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    // ─── Contracts ───────────────────────────────────────────────────────────

    /// Make an artifact's ABI available for decoding.
    pub fn register_artifact(&self, artifact: ContractArtifact) -> Arc<ContractArtifact> {
        self.store.insert(artifact)
    }

    /// Record that `name` is deployed at `address`, persisting it when a
    /// contract map file is configured.
    ///
    /// Returns `false` if the address was already registered; the existing
    /// entry is kept.
    pub fn register_deployment(&self, address: Address, name: &str) -> Result<bool, ClientError> {
        let artifact = self
            .store
            .get(name)
            .ok_or_else(|| ClientError::UnknownArtifact { name: name.to_string() })?;
        let deployment = ContractDeployment::new(address, &artifact);
        match &self.config.contract_map_file {
            Some(path) => Ok(self.contracts.insert_persisted(deployment, path)?),
            None => Ok(self.contracts.insert(deployment)),
        }
    }

    /// Re-register deployments saved by earlier runs. Returns how many were added.
    pub fn restore_contract_map(&self) -> Result<usize, ClientError> {
        let Some(path) = &self.config.contract_map_file else {
            return Ok(0);
        };
        let added = self.contracts.restore(path, &self.store)?;
        tracing::info!(path = %path.display(), added, "contract map restored");
        Ok(added)
    }

    /// "you" for the client's own keys, else the registered contract name.
    pub fn address_label(&self, address: &Address) -> String {
        if self.keys.iter().any(|k| k.address() == *address) {
            return "you".to_string();
        }
        self.contracts
            .name_of(address)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    // ─── Submission ──────────────────────────────────────────────────────────

    pub async fn next_nonce(&self, address: Address) -> Result<u64, ClientError> {
        Ok(self.nonces.next_nonce(address).await?)
    }

    pub async fn update_nonces(&self) -> Result<(), ClientError> {
        Ok(self.nonces.update_nonces().await?)
    }

    /// Broadcast an already-signed transaction.
    pub async fn submit_raw(&self, raw: &[u8]) -> Result<B256, ClientError> {
        let hash = self.eth.send_raw_transaction(raw).await?;
        tracing::debug!(tx_hash = %hash, "transaction submitted");
        Ok(hash)
    }

    /// Poll for the receipt of `tx_hash` until the configured deadline.
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ClientError> {
        let poll = Duration::from_millis(self.config.receipt.poll_interval_ms);
        let timeout = Duration::from_millis(self.config.receipt.timeout_ms);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.eth.receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() + poll > deadline {
                return Err(ClientError::ReceiptTimeout {
                    tx_hash,
                    ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Submit, wait for the receipt, and decode.
    pub async fn submit_and_decode(&self, raw: &[u8]) -> Result<Arc<DecodedTransaction>, ClientError> {
        let hash = self.submit_raw(raw).await?;
        self.wait_for_receipt(hash).await?;
        self.decode(hash).await
    }

    // ─── Decoding ────────────────────────────────────────────────────────────

    /// Decode `tx_hash`, tracing it when the tracing mode asks for it.
    ///
    /// A failed trace is returned as an error; [`decode_untraced`](Self::decode_untraced)
    /// still works for the same transaction.
    pub async fn decode(&self, tx_hash: B256) -> Result<Arc<DecodedTransaction>, ClientError> {
        let (tx, receipt) = self.fetch(tx_hash).await?;
        let traced = match self.config.tracing.mode {
            TracingMode::None => false,
            TracingMode::Reverted => !receipt.is_success(),
            TracingMode::All => true,
        };
        let decoded = if traced {
            let frame = self.tracer.trace(tx_hash).await?;
            self.decoder.decode(&tx, &receipt, &frame)
        } else {
            self.decoder.decode_untraced(&tx, &receipt)
        };
        Ok(self.remember(decoded))
    }

    /// Decode from the transaction and receipt alone: the top-level call and
    /// the receipt's events, with no nested calls.
    pub async fn decode_untraced(&self, tx_hash: B256) -> Result<Arc<DecodedTransaction>, ClientError> {
        let (tx, receipt) = self.fetch(tx_hash).await?;
        Ok(self.remember(self.decoder.decode_untraced(&tx, &receipt)))
    }

    /// Decode several transactions concurrently; results follow `hashes`.
    pub async fn decode_all(&self, hashes: &[B256]) -> Vec<Result<Arc<DecodedTransaction>, ClientError>> {
        join_all(hashes.iter().map(|h| self.decode(*h))).await
    }

    /// A transaction decoded earlier by this client.
    pub fn decoded(&self, tx_hash: &B256) -> Option<Arc<DecodedTransaction>> {
        self.decoded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tx_hash)
            .cloned()
    }

    /// Write every decoded transaction to `dir/<tx hash>.json`. Returns the file count.
    pub fn save_decoded_as_json(&self, dir: &Path) -> Result<usize, ClientError> {
        std::fs::create_dir_all(dir).map_err(|error| ClientError::Io {
            path: dir.to_path_buf(),
            error,
        })?;
        let decoded: Vec<_> = self
            .decoded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for tx in &decoded {
            let path = dir.join(format!("{}.json", tx.hash()));
            let json = serde_json::to_vec_pretty(&**tx).map_err(DecodeError::from)?;
            std::fs::write(&path, json).map_err(|error| ClientError::Io { path, error })?;
        }
        Ok(decoded.len())
    }

    async fn fetch(
        &self,
        tx_hash: B256,
    ) -> Result<(chaintrace_core::Transaction, TransactionReceipt), ClientError> {
        let not_found = || ClientError::TransactionNotFound { tx_hash };
        let tx = self.eth.transaction(tx_hash).await?.ok_or_else(not_found)?;
        let receipt = self.eth.receipt(tx_hash).await?.ok_or_else(not_found)?;
        Ok((tx, receipt))
    }

    fn remember(&self, decoded: DecodedTransaction) -> Arc<DecodedTransaction> {
        let decoded = Arc::new(decoded);
        if decoded.is_reverted() {
            tracing::info!(
                tx_hash = %decoded.hash(),
                call = %decoded.root.summary(),
                reason = ?decoded.revert_reason().map(ToString::to_string),
                "transaction reverted"
            );
        } else {
            tracing::debug!(tx_hash = %decoded.hash(), call = %decoded.root.summary(), "transaction decoded");
        }
        self.decoded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(decoded.hash(), Arc::clone(&decoded));
        decoded
    }
}
