//! `Tracer`: fetches a transaction's call tree from the node.
//!
//! Sources are tried in order. A source that reports the method as
//! unsupported hands over to the next one; any other failure ends the
//! attempt. Transient errors are retried per source with exponential
//! backoff. The whole fetch (all sources, all retries, the code snapshot)
//! is bounded by one deadline.
//!
//! Fetched trees are cached by transaction hash; a trace is immutable once
//! the transaction is mined.

use alloy_primitives::{Address, Bytes, B256};
use chaintrace_core::CallFrame;
use chaintrace_evm::ContractMap;
use chaintrace_rpc::{EthApi, RetryConfig, RetryPolicy};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::call_tracer::CallTracerSource;
use crate::error::TraceError;
use crate::parity::ParityTraceSource;
use crate::source::CallTraceSource;

#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Deadline for one `trace` call, retries included.
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Fetch runtime code for callees missing from the contract map, so the
    /// ABI finder can match them by bytecode.
    pub fetch_code: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            fetch_code: true,
        }
    }
}

pub struct Tracer {
    sources: Vec<Arc<dyn CallTraceSource>>,
    eth: EthApi,
    contracts: Option<Arc<ContractMap>>,
    retry: RetryPolicy,
    config: TracerConfig,
    cache: RwLock<HashMap<B256, Arc<CallFrame>>>,
}

impl Tracer {
    /// `callTracer` first, `trace_transaction` reconstruction as fallback.
    pub fn new(eth: EthApi, config: TracerConfig) -> Self {
        let sources: Vec<Arc<dyn CallTraceSource>> = vec![
            Arc::new(CallTracerSource::new(eth.clone())),
            Arc::new(ParityTraceSource::new(eth.clone())),
        ];
        Self::with_sources(eth, sources, config)
    }

    pub fn with_sources(
        eth: EthApi,
        sources: Vec<Arc<dyn CallTraceSource>>,
        config: TracerConfig,
    ) -> Self {
        Self {
            sources,
            eth,
            contracts: None,
            retry: RetryPolicy::new(config.retry.clone()),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Skip code snapshots for addresses already registered here.
    pub fn with_contract_map(mut self, contracts: Arc<ContractMap>) -> Self {
        self.contracts = Some(contracts);
        self
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// A previously fetched trace, without touching the node.
    pub fn cached(&self, tx_hash: &B256) -> Option<Arc<CallFrame>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tx_hash)
            .cloned()
    }

    /// Fetch the call tree of `tx_hash`.
    pub async fn trace(&self, tx_hash: B256) -> Result<Arc<CallFrame>, TraceError> {
        if let Some(hit) = self.cached(&tx_hash) {
            tracing::debug!(%tx_hash, "trace cache hit");
            return Ok(hit);
        }

        let ms = self.config.timeout.as_millis() as u64;
        let fetched = async {
            let mut frame = self.fetch(tx_hash).await?;
            if self.config.fetch_code {
                self.snapshot_code(&mut frame).await;
            }
            Ok::<_, TraceError>(frame)
        };
        let frame = tokio::time::timeout(self.config.timeout, fetched)
            .await
            .map_err(|_| TraceError::Timeout { ms })??;

        let frame = Arc::new(frame);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tx_hash)
            .or_insert_with(|| Arc::clone(&frame));
        Ok(frame)
    }

    async fn fetch(&self, tx_hash: B256) -> Result<CallFrame, TraceError> {
        let mut last = TraceError::NoSources;
        for source in &self.sources {
            let label = source.name();
            match self.retry.run(label, || source.trace(tx_hash)).await {
                Ok(frame) => {
                    tracing::debug!(%tx_hash, source = label, frames = frame.frame_count(), "trace fetched");
                    return Ok(frame);
                }
                Err(TraceError::Unsupported { method }) => {
                    tracing::info!(%tx_hash, source = label, %method, "trace method unsupported, trying next source");
                    last = TraceError::Unsupported { method };
                }
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }

    /// Best effort: failures leave the affected frames without code.
    async fn snapshot_code(&self, root: &mut CallFrame) {
        let mut wanted = HashSet::new();
        for (_, frame) in root.walk() {
            if frame.kind.is_create() || frame.code.is_some() || frame.code_hash.is_some() {
                continue;
            }
            let known = self
                .contracts
                .as_ref()
                .is_some_and(|c| c.contains(&frame.to));
            if !known {
                wanted.insert(frame.to);
            }
        }
        if wanted.is_empty() {
            return;
        }

        let addresses: Vec<Address> = wanted.into_iter().collect();
        let results = join_all(addresses.iter().map(|a| self.eth.code(*a))).await;
        let mut codes = HashMap::new();
        for (address, result) in addresses.into_iter().zip(results) {
            match result {
                Ok(code) if !code.is_empty() => {
                    codes.insert(address, code);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(%address, error = %e, "code snapshot failed"),
            }
        }
        attach_code(root, &codes);
    }
}

fn attach_code(frame: &mut CallFrame, codes: &HashMap<Address, Bytes>) {
    if frame.code.is_none() && !frame.kind.is_create() {
        frame.code = codes.get(&frame.to).cloned();
    }
    for child in &mut frame.children {
        attach_code(child, codes);
    }
}
