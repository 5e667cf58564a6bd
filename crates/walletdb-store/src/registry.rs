//! Process-wide set of named stores.
//!
//! The registry is constructed explicitly and initialized exactly once.
//! Initialization either opens every store or leaves the registry
//! uninitialized; there is no partially-open state and no lazy opening.
//! After initialization the store table is immutable and read without
//! locking.

use crate::cached::CachedStore;
use crate::store::KvStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};
use walletdb_common::config::{CacheConfig, StorageConfig};
use walletdb_common::{Error, Result};

/// Logical stores owned by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    /// Key shares, DKG material and other secrets
    Wallet,
    /// Certificate signing requests
    Csr,
    /// Signing status of each certificate request
    CsrStatus,
}

impl StoreName {
    pub const ALL: [StoreName; 3] = [Self::Wallet, Self::Csr, Self::CsrStatus];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Csr => "csr",
            Self::CsrStatus => "csr-status",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StoreName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown store '{s}'")))
    }
}

struct RegistryState {
    data_dir: PathBuf,
    stores: HashMap<StoreName, Arc<KvStore>>,
}

/// Init-once table of named stores
pub struct StoreRegistry {
    config: StorageConfig,
    /// Serializes `initialize` calls
    init_lock: Mutex<()>,
    state: OnceLock<RegistryState>,
}

impl StoreRegistry {
    /// Create an uninitialized registry. Nothing touches the disk until
    /// [`initialize`](Self::initialize).
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            init_lock: Mutex::new(()),
            state: OnceLock::new(),
        }
    }

    /// Create the data directory and open every store.
    ///
    /// Fails with `AlreadyInitialized` on any call after the first
    /// successful one. A failed call leaves the registry uninitialized.
    pub fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock();
        if self.state.get().is_some() {
            return Err(Error::AlreadyInitialized);
        }

        info!("Initing wallet database ... ");

        let data_dir = resolve_data_dir(&self.config.data_dir)?;
        if !data_dir.is_dir() {
            info!("Data folder {} does not exist. Creating ...", data_dir.display());
            std::fs::create_dir_all(&data_dir).map_err(|source| {
                error!("Could not create data folder {}: {}", data_dir.display(), source);
                Error::DirectoryCreationFailed {
                    path: data_dir.clone(),
                    source,
                }
            })?;
            info!("Successfully created data folder");
        }

        info!("Opening wallet databases");

        // Stores opened so far are dropped (and closed) if a later one fails.
        let mut stores = HashMap::with_capacity(StoreName::ALL.len());
        for name in StoreName::ALL {
            let store = KvStore::open(name.as_str(), data_dir.join(name.as_str()))
                .map_err(|e| {
                    error!("Could not open store '{}': {}", name, e);
                    match e {
                        Error::StoreOpenFailed { .. } => e,
                        other => Error::StoreOpenFailed {
                            name: name.to_string(),
                            reason: other.to_string(),
                        },
                    }
                })?;
            stores.insert(name, Arc::new(store));
        }

        let state = RegistryState {
            data_dir: data_dir.clone(),
            stores,
        };
        if self.state.set(state).is_err() {
            return Err(Error::AlreadyInitialized);
        }

        info!("Successfully opened databases in {}", data_dir.display());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// Shared handle to a named store
    pub fn get(&self, name: StoreName) -> Result<Arc<KvStore>> {
        let state = self.state()?;
        state
            .stores
            .get(&name)
            .cloned()
            .ok_or(Error::NotInitialized)
    }

    /// Named store fronted by a fresh LRU cache sized from `cache`
    pub fn cached(&self, name: StoreName, cache: &CacheConfig) -> Result<CachedStore> {
        Ok(CachedStore::from_config(self.get(name)?, cache))
    }

    pub fn wallet(&self) -> Result<Arc<KvStore>> {
        self.get(StoreName::Wallet)
    }

    pub fn csr(&self) -> Result<Arc<KvStore>> {
        self.get(StoreName::Csr)
    }

    pub fn csr_status(&self) -> Result<Arc<KvStore>> {
        self.get(StoreName::CsrStatus)
    }

    /// Resolved root directory holding all stores
    pub fn data_directory(&self) -> Result<&Path> {
        Ok(&self.state()?.data_dir)
    }

    fn state(&self) -> Result<&RegistryState> {
        self.state.get().ok_or(Error::NotInitialized)
    }
}

/// Relative data directories are anchored at the working directory.
fn resolve_data_dir(configured: &Path) -> Result<PathBuf> {
    if configured.is_absolute() {
        return Ok(configured.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| {
        error!("Could not get current working directory: {}", source);
        Error::DirectoryCreationFailed {
            path: configured.to_path_buf(),
            source,
        }
    })?;
    Ok(cwd.join(configured))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    fn registry_at(dir: &Path) -> StoreRegistry {
        StoreRegistry::new(StorageConfig {
            data_dir: dir.to_path_buf(),
        })
    }

    #[test]
    fn test_initialize_creates_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("sgx_data");
        let registry = registry_at(&root);
        assert!(!registry.is_initialized());

        registry.initialize().unwrap();

        assert!(registry.is_initialized());
        assert_eq!(registry.data_directory().unwrap(), root);
        for name in StoreName::ALL {
            assert!(root.join(name.as_str()).is_dir());
            assert_eq!(registry.get(name).unwrap().name(), name.as_str());
        }
    }

    #[test]
    fn test_use_before_initialize() {
        let dir = tempdir().unwrap();
        let registry = registry_at(dir.path());

        assert!(matches!(registry.wallet(), Err(Error::NotInitialized)));
        assert!(matches!(registry.data_directory(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_double_initialize() {
        let dir = tempdir().unwrap();
        let registry = registry_at(dir.path());
        registry.initialize().unwrap();

        let wallet = registry.wallet().unwrap();
        wallet.write("k", "v").unwrap();

        assert!(matches!(registry.initialize(), Err(Error::AlreadyInitialized)));
        assert!(Arc::ptr_eq(&wallet, &registry.wallet().unwrap()));
        assert_eq!(registry.wallet().unwrap().read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_concurrent_initialize_single_winner() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(registry_at(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.initialize().is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert!(registry.is_initialized());
    }

    #[test]
    fn test_cached_store_uses_configured_capacity() {
        let dir = tempdir().unwrap();
        let registry = registry_at(dir.path());
        let cache = CacheConfig { capacity: 3 };
        assert!(matches!(
            registry.cached(StoreName::Wallet, &cache),
            Err(Error::NotInitialized)
        ));

        registry.initialize().unwrap();
        registry.wallet().unwrap().write("k", "v").unwrap();

        let cached = registry.cached(StoreName::Wallet, &cache).unwrap();
        assert_eq!(cached.cache().capacity(), 3);
        assert!(Arc::ptr_eq(cached.store(), &registry.wallet().unwrap()));
        assert_eq!(cached.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_stores_are_isolated() {
        let dir = tempdir().unwrap();
        let registry = registry_at(dir.path());
        registry.initialize().unwrap();

        registry.csr().unwrap().write("hash", "-----BEGIN CERTIFICATE REQUEST-----").unwrap();
        registry.csr_status().unwrap().write("hash", "0").unwrap();

        assert_eq!(registry.wallet().unwrap().read("hash").unwrap(), None);
        assert_eq!(registry.csr_status().unwrap().read("hash").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_directory_creation_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let registry = registry_at(&blocker.join("sgx_data"));
        let err = registry.initialize().unwrap_err();

        assert!(matches!(err, Error::DirectoryCreationFailed { .. }));
        assert!(err.is_startup_failure());
        assert!(!registry.is_initialized());
    }

    #[test]
    fn test_store_open_failure_is_all_or_nothing() {
        let dir = tempdir().unwrap();
        // A file where the csr store directory should be
        let blocker = dir.path().join("csr");
        std::fs::write(&blocker, b"").unwrap();

        let registry = registry_at(dir.path());
        let err = registry.initialize().unwrap_err();

        assert!(matches!(err, Error::StoreOpenFailed { ref name, .. } if name == "csr"));
        assert!(!registry.is_initialized());
        assert!(matches!(registry.wallet(), Err(Error::NotInitialized)));

        // The wallet store opened before the failure was closed again
        std::fs::remove_file(&blocker).unwrap();
        registry.initialize().unwrap();
        assert!(registry.csr().is_ok());
    }

    #[test]
    fn test_relative_data_dir_is_anchored_at_cwd() {
        let resolved = resolve_data_dir(Path::new("sgx_data")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sgx_data"));

        let absolute = Path::new("/var/lib/walletdb");
        assert_eq!(resolve_data_dir(absolute).unwrap(), absolute);
    }

    #[test]
    fn test_store_name_parse() {
        assert_eq!("csr-status".parse::<StoreName>().unwrap(), StoreName::CsrStatus);
        assert_eq!(StoreName::Wallet.to_string(), "wallet");
        assert!(matches!(
            "ledger".parse::<StoreName>(),
            Err(Error::Configuration(_))
        ));
    }
}
