//! Per-address nonce allocation for concurrent senders.
//!
//! Each tracked address owns an async mutex around its counter, so callers
//! allocating for different addresses never contend. The counter is seeded
//! from the chain's pending transaction count on first use, and only ever
//! moves forward: a resync raises it to the chain's value when the chain is
//! ahead (another sender used the key) and otherwise leaves it alone, since
//! nonces already handed out may not be mined yet.

use alloy_primitives::Address;
use async_trait::async_trait;
use chaintrace_rpc::{BlockTag, EthApi, RetryConfig, RetryPolicy, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::NonceError;

/// Where on-chain nonces come from.
#[async_trait]
pub trait NonceSource: Send + Sync {
    /// Transaction count of `address` including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64, TransportError>;

    /// Same as [`pending_nonce`](Self::pending_nonce) for many addresses.
    /// Either every count is returned, in order, or an error.
    async fn pending_nonces(&self, addresses: &[Address]) -> Result<Vec<u64>, TransportError>;
}

#[async_trait]
impl NonceSource for EthApi {
    async fn pending_nonce(&self, address: Address) -> Result<u64, TransportError> {
        self.transaction_count(address, BlockTag::Pending).await
    }

    async fn pending_nonces(&self, addresses: &[Address]) -> Result<Vec<u64>, TransportError> {
        self.transaction_counts(addresses).await
    }
}

#[derive(Debug, Default)]
struct NonceState {
    /// Next nonce to hand out; `None` until seeded from the chain.
    next: Option<u64>,
}

pub struct NonceManager {
    source: Arc<dyn NonceSource>,
    states: RwLock<HashMap<Address, Arc<Mutex<NonceState>>>>,
    sync_timeout: Duration,
    retry: RetryPolicy,
}

impl NonceManager {
    pub fn new(
        source: Arc<dyn NonceSource>,
        addresses: impl IntoIterator<Item = Address>,
        sync_timeout: Duration,
    ) -> Self {
        let states = addresses
            .into_iter()
            .map(|a| (a, Arc::new(Mutex::new(NonceState::default()))))
            .collect();
        Self {
            source,
            states: RwLock::new(states),
            sync_timeout,
            retry: RetryPolicy::new(RetryConfig::none()),
        }
    }

    /// Retry transient failures when querying the chain.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryPolicy::new(config);
        self
    }

    /// Start tracking `address`; a no-op if it is already tracked.
    pub fn track(&self, address: Address) {
        self.state(address);
    }

    /// Tracked addresses, sorted.
    pub fn tracked(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        addresses.sort();
        addresses
    }

    /// The nonce the next `next_nonce(address)` call would return, if known.
    pub async fn peek(&self, address: Address) -> Option<u64> {
        let state = self.existing(&address)?;
        let guard = state.lock().await;
        guard.next
    }

    /// Allocate the next nonce for `address`.
    ///
    /// Concurrent callers for the same address are serialised and each gets a
    /// distinct, increasing value. On error the counter is not advanced.
    pub async fn next_nonce(&self, address: Address) -> Result<u64, NonceError> {
        let state = self.state(address);
        let mut guard = state.lock().await;
        let nonce = match guard.next {
            Some(n) => n,
            None => {
                let n = self.fetch_one(address).await?;
                tracing::debug!(%address, nonce = n, "nonce seeded from chain");
                n
            }
        };
        guard.next = Some(nonce + 1);
        Ok(nonce)
    }

    /// Resynchronise every tracked address with the chain.
    ///
    /// Counts are fetched in one batch before any counter is touched, so a
    /// failed fetch changes nothing. Counters are raised, never lowered.
    pub async fn update_nonces(&self) -> Result<(), NonceError> {
        let addresses = self.tracked();
        if addresses.is_empty() {
            return Ok(());
        }
        let counts = self.fetch_many(&addresses).await?;

        for (address, chain) in addresses.into_iter().zip(counts) {
            let state = self.state(address);
            let mut guard = state.lock().await;
            match guard.next {
                Some(current) if chain > current => {
                    tracing::warn!(%address, old = current, new = chain, "nonce desync detected; raising counter");
                    guard.next = Some(chain);
                }
                Some(current) => {
                    tracing::debug!(%address, current, chain, "nonce in sync");
                }
                None => {
                    tracing::debug!(%address, nonce = chain, "nonce seeded from chain");
                    guard.next = Some(chain);
                }
            }
        }
        Ok(())
    }

    fn existing(&self, address: &Address) -> Option<Arc<Mutex<NonceState>>> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    fn state(&self, address: Address) -> Arc<Mutex<NonceState>> {
        if let Some(state) = self.existing(&address) {
            return state;
        }
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(states.entry(address).or_default())
    }

    fn timeout_error(&self) -> NonceError {
        NonceError::Timeout {
            ms: self.sync_timeout.as_millis() as u64,
        }
    }

    async fn fetch_one(&self, address: Address) -> Result<u64, NonceError> {
        let fut = self
            .retry
            .run("pending_nonce", || self.source.pending_nonce(address));
        Ok(tokio::time::timeout(self.sync_timeout, fut)
            .await
            .map_err(|_| self.timeout_error())??)
    }

    async fn fetch_many(&self, addresses: &[Address]) -> Result<Vec<u64>, NonceError> {
        let fut = self
            .retry
            .run("pending_nonces", || self.source.pending_nonces(addresses));
        let counts = tokio::time::timeout(self.sync_timeout, fut)
            .await
            .map_err(|_| self.timeout_error())??;
        if counts.len() != addresses.len() {
            return Err(NonceError::Transport(TransportError::Other(format!(
                "expected {} nonces, got {}",
                addresses.len(),
                counts.len()
            ))));
        }
        Ok(counts)
    }
}
