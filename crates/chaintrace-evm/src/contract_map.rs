//! Address → deployed contract registry.
//!
//! Append-only for the lifetime of a run: an address, once registered, keeps
//! its deployment. Inserts take the write lock and publish a fully built
//! `Arc<ContractDeployment>`, so readers never see a partial entry.
//!
//! Deployments can be persisted as TOML (`"0xAddress" = "ContractName"`) and
//! restored against an [`AbiStore`] in a later run. Saves within a process
//! are serialised, and each one replaces the file atomically.

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, B256};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::ContractMapError;
use crate::store::{AbiStore, ContractArtifact};

#[derive(Debug, Clone)]
pub struct ContractDeployment {
    pub address: Address,
    pub name: String,
    pub abi: Arc<JsonAbi>,
    /// keccak256 of the runtime code, when known.
    pub code_hash: Option<B256>,
}

impl ContractDeployment {
    pub fn new(address: Address, artifact: &ContractArtifact) -> Self {
        Self {
            address,
            name: artifact.name.clone(),
            abi: Arc::clone(&artifact.abi),
            code_hash: artifact.runtime_code_hash(),
        }
    }

    pub fn with_code_hash(mut self, hash: B256) -> Self {
        self.code_hash = Some(hash);
        self
    }
}

#[derive(Default)]
pub struct ContractMap {
    inner: RwLock<HashMap<Address, Arc<ContractDeployment>>>,
}

impl ContractMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployment. Returns `false`, leaving the existing entry in
    /// place, if the address is already known.
    pub fn insert(&self, deployment: ContractDeployment) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.contains_key(&deployment.address) {
            return false;
        }
        tracing::debug!(address = %deployment.address, name = %deployment.name, "contract registered");
        inner.insert(deployment.address, Arc::new(deployment));
        true
    }

    /// Like [`insert`](Self::insert), but the entry is first saved to the
    /// contract file at `path`. A failed save leaves the map unchanged.
    pub fn insert_persisted(
        &self,
        deployment: ContractDeployment,
        path: &Path,
    ) -> Result<bool, ContractMapError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.contains_key(&deployment.address) {
            return Ok(false);
        }
        save_deployed_contract(path, deployment.address, &deployment.name)?;
        tracing::debug!(address = %deployment.address, name = %deployment.name, path = %path.display(), "contract registered and saved");
        inner.insert(deployment.address, Arc::new(deployment));
        Ok(true)
    }

    pub fn get(&self, address: &Address) -> Option<Arc<ContractDeployment>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }

    pub fn name_of(&self, address: &Address) -> Option<String> {
        self.get(address).map(|d| d.name.clone())
    }

    /// Any registered deployment whose runtime code hashes to `hash`.
    pub fn by_code_hash(&self, hash: &B256) -> Option<Arc<ContractDeployment>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|d| d.code_hash.as_ref() == Some(hash))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register every entry of a saved contract file whose name is in `store`.
    ///
    /// Returns how many entries were added. Names with no artifact are skipped.
    pub fn restore(&self, path: &Path, store: &AbiStore) -> Result<usize, ContractMapError> {
        let mut added = 0;
        for (address, name) in load_deployed_contracts(path)? {
            match store.get(&name) {
                Some(artifact) => {
                    if self.insert(ContractDeployment::new(address, &artifact)) {
                        added += 1;
                    }
                }
                None => {
                    tracing::warn!(%address, name = %name, "no artifact for saved contract; skipping");
                }
            }
        }
        Ok(added)
    }
}

/// Held across the read-modify-write of a save.
static SAVE_LOCK: Mutex<()> = Mutex::new(());

/// Read a saved contract file. A missing file yields an empty map.
pub fn load_deployed_contracts(path: &Path) -> Result<BTreeMap<Address, String>, ContractMapError> {
    let raw = read_raw(path)?;
    raw.into_iter()
        .map(|(key, name)| {
            let address = key.parse::<Address>().map_err(|_| ContractMapError::InvalidAddress {
                path: path.to_path_buf(),
                value: key.clone(),
            })?;
            Ok((address, name))
        })
        .collect()
}

/// Add or update one entry in a saved contract file, creating it if needed.
pub fn save_deployed_contract(
    path: &Path,
    address: Address,
    name: &str,
) -> Result<(), ContractMapError> {
    let _guard = SAVE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let mut raw = read_raw(path)?;
    raw.insert(address.to_checksum(None), name.to_string());
    let text = toml::to_string(&raw)?;

    let io_err = |source: std::io::Error| ContractMapError::Io {
        path: path.to_path_buf(),
        source,
    };
    // Same directory, so the rename cannot cross filesystems.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn read_raw(path: &Path) -> Result<BTreeMap<String, String>, ContractMapError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(ContractMapError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ContractMapError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> ContractArtifact {
        ContractArtifact::from_abi_json("Token", "[]").unwrap()
    }

    #[test]
    fn insert_is_append_only() {
        let map = ContractMap::new();
        let addr = Address::repeat_byte(1);
        assert!(map.insert(ContractDeployment::new(addr, &token())));

        let other = ContractArtifact::from_abi_json("Other", "[]").unwrap();
        assert!(!map.insert(ContractDeployment::new(addr, &other)));
        assert_eq!(map.name_of(&addr).as_deref(), Some("Token"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn code_hash_lookup() {
        let map = ContractMap::new();
        let hash = B256::repeat_byte(7);
        map.insert(ContractDeployment::new(Address::repeat_byte(2), &token()).with_code_hash(hash));
        assert_eq!(map.by_code_hash(&hash).unwrap().address, Address::repeat_byte(2));
        assert!(map.by_code_hash(&B256::ZERO).is_none());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_deployed_contracts(&dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");
        save_deployed_contract(&path, Address::repeat_byte(0xaa), "Token").unwrap();
        save_deployed_contract(&path, Address::repeat_byte(0xbb), "Missing").unwrap();

        let loaded = load_deployed_contracts(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&Address::repeat_byte(0xaa)], "Token");

        let store = AbiStore::new();
        store.insert(token());
        let map = ContractMap::new();
        assert_eq!(map.restore(&path, &store).unwrap(), 1);
        assert!(map.contains(&Address::repeat_byte(0xaa)));
        assert!(!map.contains(&Address::repeat_byte(0xbb)));
    }

    #[test]
    fn malformed_address_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");
        std::fs::write(&path, "\"0xnot-an-address\" = \"Token\"\n").unwrap();
        assert!(matches!(
            load_deployed_contracts(&path),
            Err(ContractMapError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert!(matches!(
            load_deployed_contracts(&path),
            Err(ContractMapError::Parse { .. })
        ));
    }

    #[test]
    fn concurrent_saves_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");
        std::thread::scope(|scope| {
            for i in 0..16u8 {
                let path = &path;
                scope.spawn(move || save_deployed_contract(path, Address::repeat_byte(i + 1), "Token").unwrap());
            }
        });
        let loaded = load_deployed_contracts(&path).unwrap();
        assert_eq!(loaded.len(), 16);
    }

    #[test]
    fn concurrent_persisted_inserts_match_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");
        let map = ContractMap::new();
        let artifact = token();
        std::thread::scope(|scope| {
            for i in 0..16u8 {
                let (map, path, artifact) = (&map, &path, &artifact);
                scope.spawn(move || {
                    let deployment = ContractDeployment::new(Address::repeat_byte(i + 1), artifact);
                    assert!(map.insert_persisted(deployment, path).unwrap());
                });
            }
        });
        assert_eq!(map.len(), 16);
        let loaded = load_deployed_contracts(&path).unwrap();
        assert_eq!(loaded.len(), 16);
        assert!(loaded.keys().all(|a| map.contains(a)));
    }

    #[test]
    fn failed_save_leaves_map_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let addr = Address::repeat_byte(0xcc);
        let map = ContractMap::new();

        let unwritable = dir.path().join("missing-dir").join("contracts.toml");
        let err = map
            .insert_persisted(ContractDeployment::new(addr, &token()), &unwritable)
            .unwrap_err();
        assert!(matches!(err, ContractMapError::Io { .. }));
        assert!(!map.contains(&addr));

        let path = dir.path().join("contracts.toml");
        assert!(map.insert_persisted(ContractDeployment::new(addr, &token()), &path).unwrap());
        assert_eq!(load_deployed_contracts(&path).unwrap()[&addr], "Token");
        assert!(!map.insert_persisted(ContractDeployment::new(addr, &token()), &path).unwrap());
    }
}
