//! ABI resolution for addresses seen in a trace.
//!
//! Resolution order:
//! 1. Address registered in the [`ContractMap`]
//! 2. Code snapshot of the frame matched against known artifacts
//!    (runtime-code hash, or creation code for CREATE frames)
//! 3. EIP-1167 clone whose implementation is registered
//! 4. Function selector declared in a known ABI (only when enabled)
//! 5. [`AbiMatch::Unresolved`]
//!
//! Steps 2 and 3 register the address so later frames resolve at step 1.
//! An unresolved address is an expected outcome (precompiles, third-party
//! contracts) and is reported, never raised as an error.

use alloy_primitives::{Address, B256};
use chaintrace_core::{AbiMatchKind, CallFrame};
use std::sync::Arc;

use crate::abi::{find_function, keccak256};
use crate::contract_map::{ContractDeployment, ContractMap};
use crate::proxy::eip1167_implementation;
use crate::store::AbiStore;

/// Result of an ABI lookup.
#[derive(Debug, Clone)]
pub enum AbiMatch {
    Found {
        deployment: Arc<ContractDeployment>,
        kind: AbiMatchKind,
    },
    Unresolved,
}

impl AbiMatch {
    pub fn kind(&self) -> AbiMatchKind {
        match self {
            Self::Found { kind, .. } => *kind,
            Self::Unresolved => AbiMatchKind::Unresolved,
        }
    }

    pub fn deployment(&self) -> Option<&Arc<ContractDeployment>> {
        match self {
            Self::Found { deployment, .. } => Some(deployment),
            Self::Unresolved => None,
        }
    }
}

pub struct AbiFinder {
    contracts: Arc<ContractMap>,
    store: Arc<AbiStore>,
    selector_fallback: bool,
}

impl AbiFinder {
    pub fn new(contracts: Arc<ContractMap>, store: Arc<AbiStore>) -> Self {
        Self {
            contracts,
            store,
            selector_fallback: false,
        }
    }

    /// Also match unknown addresses by function selector across all known ABIs.
    pub fn with_selector_fallback(mut self, enabled: bool) -> Self {
        self.selector_fallback = enabled;
        self
    }

    pub fn contracts(&self) -> &Arc<ContractMap> {
        &self.contracts
    }

    pub fn store(&self) -> &Arc<AbiStore> {
        &self.store
    }

    /// Lookup by address alone.
    pub fn find(&self, address: &Address) -> AbiMatch {
        match self.contracts.get(address) {
            Some(deployment) => AbiMatch::Found {
                deployment,
                kind: AbiMatchKind::Address,
            },
            None => AbiMatch::Unresolved,
        }
    }

    /// Lookup for the callee of `frame`, using its code snapshot and selector when present.
    pub fn find_frame(&self, frame: &CallFrame) -> AbiMatch {
        let address = frame.to;

        if let found @ AbiMatch::Found { .. } = self.find(&address) {
            return found;
        }

        // CREATE frames carry the runtime code as output.
        let code = match (&frame.code, frame.kind.is_create()) {
            (Some(code), _) => Some(code.clone()),
            (None, true) if !frame.output.is_empty() => Some(frame.output.clone()),
            _ => None,
        };
        let code_hash: Option<B256> = frame
            .code_hash
            .or_else(|| code.as_ref().filter(|c| !c.is_empty()).map(|c| keccak256(c)));

        if let Some(hash) = code_hash {
            if let Some(artifact) = self.store.by_code_hash(&hash) {
                let deployment = ContractDeployment::new(address, &artifact).with_code_hash(hash);
                return self.register(deployment, AbiMatchKind::Bytecode);
            }
            if let Some(known) = self.contracts.by_code_hash(&hash) {
                let deployment = ContractDeployment {
                    address,
                    name: known.name.clone(),
                    abi: Arc::clone(&known.abi),
                    code_hash: Some(hash),
                };
                return self.register(deployment, AbiMatchKind::Bytecode);
            }
        }

        if frame.kind.is_create() {
            if let Some(artifact) = self.store.by_init_code(&frame.input) {
                let mut deployment = ContractDeployment::new(address, &artifact);
                if code_hash.is_some() {
                    deployment.code_hash = code_hash;
                }
                return self.register(deployment, AbiMatchKind::Bytecode);
            }
        }

        if let Some(implementation) = code.as_ref().and_then(|c| eip1167_implementation(c)) {
            if let Some(target) = self.contracts.get(&implementation) {
                tracing::debug!(%address, %implementation, name = %target.name, "resolved EIP-1167 clone");
                let deployment = ContractDeployment {
                    address,
                    name: target.name.clone(),
                    abi: Arc::clone(&target.abi),
                    code_hash,
                };
                return self.register(deployment, AbiMatchKind::Proxy);
            }
        }

        if self.selector_fallback {
            if let Some(found) = self.find_by_selector(frame) {
                return found;
            }
        }

        tracing::debug!(%address, kind = %frame.kind, "no ABI for address");
        AbiMatch::Unresolved
    }

    /// Not registered: a selector is weak evidence, so each frame is matched afresh.
    fn find_by_selector(&self, frame: &CallFrame) -> Option<AbiMatch> {
        let selector = frame.selector()?;
        let candidates: Vec<_> = self
            .store
            .artifacts()
            .into_iter()
            .filter(|a| find_function(&a.abi, selector).is_some())
            .collect();
        let first = candidates.first()?;
        Some(AbiMatch::Found {
            deployment: Arc::new(ContractDeployment::new(frame.to, first)),
            kind: AbiMatchKind::Selector {
                duplicates: candidates.len() - 1,
            },
        })
    }

    fn register(&self, deployment: ContractDeployment, kind: AbiMatchKind) -> AbiMatch {
        let address = deployment.address;
        self.contracts.insert(deployment);
        // A concurrent decode may have registered the address first; the map's entry wins.
        match self.contracts.get(&address) {
            Some(deployment) => AbiMatch::Found { deployment, kind },
            None => AbiMatch::Unresolved,
        }
    }
}
