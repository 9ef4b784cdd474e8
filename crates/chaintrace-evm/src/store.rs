//! Known contract artifacts: name → ABI plus creation and runtime bytecode.
//!
//! Artifacts are supplied by the caller (generated bindings, compiler output).
//! The store indexes runtime-code hashes so frames that touch contracts
//! deployed during a run can be matched by bytecode.

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Bytes, B256};
use chaintrace_core::DecodeError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::abi::{keccak256, parse_abi};

#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: Arc<JsonAbi>,
    /// Creation code (without constructor arguments).
    pub bytecode: Option<Bytes>,
    /// Runtime code as deployed.
    pub deployed_bytecode: Option<Bytes>,
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, abi: JsonAbi) -> Self {
        Self {
            name: name.into(),
            abi: Arc::new(abi),
            bytecode: None,
            deployed_bytecode: None,
        }
    }

    pub fn from_abi_json(name: impl Into<String>, abi_json: &str) -> Result<Self, DecodeError> {
        Ok(Self::new(name, parse_abi(abi_json)?))
    }

    pub fn with_bytecode(mut self, code: impl Into<Bytes>) -> Self {
        self.bytecode = Some(code.into());
        self
    }

    pub fn with_deployed_bytecode(mut self, code: impl Into<Bytes>) -> Self {
        self.deployed_bytecode = Some(code.into());
        self
    }

    pub fn runtime_code_hash(&self) -> Option<B256> {
        self.deployed_bytecode
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| keccak256(c))
    }

    /// `true` when `init_code` is this artifact's creation code followed by constructor args.
    pub fn matches_init_code(&self, init_code: &[u8]) -> bool {
        match &self.bytecode {
            Some(code) if !code.is_empty() => init_code.starts_with(code),
            _ => false,
        }
    }
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, Arc<ContractArtifact>>,
    by_code_hash: HashMap<B256, String>,
    /// Registration order, for deterministic cross-ABI searches.
    order: Vec<String>,
}

/// Thread-safe artifact registry.
#[derive(Default)]
pub struct AbiStore {
    inner: RwLock<Inner>,
}

impl AbiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an artifact.
    pub fn insert(&self, artifact: ContractArtifact) -> Arc<ContractArtifact> {
        let artifact = Arc::new(artifact);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(hash) = artifact.runtime_code_hash() {
            inner.by_code_hash.insert(hash, artifact.name.clone());
        }
        if inner
            .by_name
            .insert(artifact.name.clone(), Arc::clone(&artifact))
            .is_none()
        {
            inner.order.push(artifact.name.clone());
        }
        artifact
    }

    pub fn get(&self, name: &str) -> Option<Arc<ContractArtifact>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_name.get(name).cloned()
    }

    pub fn by_code_hash(&self, hash: &B256) -> Option<Arc<ContractArtifact>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .by_code_hash
            .get(hash)
            .and_then(|name| inner.by_name.get(name))
            .cloned()
    }

    /// Artifact whose creation code prefixes `init_code`; the longest match wins.
    pub fn by_init_code(&self, init_code: &[u8]) -> Option<Arc<ContractArtifact>> {
        self.artifacts()
            .into_iter()
            .filter(|a| a.matches_init_code(init_code))
            .max_by_key(|a| a.bytecode.as_ref().map_or(0, |b| b.len()))
    }

    /// All artifacts in registration order.
    pub fn artifacts(&self) -> Vec<Arc<ContractArtifact>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|n| inner.by_name.get(n).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
