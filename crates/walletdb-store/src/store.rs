//! Key-value store over one engine instance.
//!
//! Adds the versioned-record contract on top of the raw engine: values are
//! always written with their creation time and read back transparently in
//! either format. Everything here is a thin, fail-fast wrapper: engine
//! errors surface as `StorageUnavailable` and are never retried.

use crate::codec::{self, Record, RecordFormat};
use crate::engine::{Engine, RedbEngine};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walletdb_common::{Error, Result};

/// Key prefixes that gate the namespaced delete entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyNamespace {
    /// Temporary Diffie-Hellman key material produced during DKG
    DkgDhKey,
    /// Temporary network-exchange keys
    TempNek,
}

impl KeyNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::DkgDhKey => "DKG_DH_KEY_",
            Self::TempNek => "tmp_NEK",
        }
    }

    pub fn contains(self, key: &str) -> bool {
        key.starts_with(self.prefix())
    }
}

/// Receives keys during [`KvStore::visit_keys`].
pub trait KeyVisitor {
    fn visit_key(&mut self, key: &str);
}

impl<F: FnMut(&str)> KeyVisitor for F {
    fn visit_key(&mut self, key: &str) {
        self(key)
    }
}

/// Output of [`KvStore::dump_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpReport {
    /// One line per reported record
    pub text: String,
    /// Records reported
    pub count: u64,
    /// Corrupt records left out of the report
    pub skipped: u64,
}

/// Most recently created versioned record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRecord {
    pub key: String,
    pub created_at: u64,
}

/// A named store wrapping an exclusively owned engine instance.
pub struct KvStore {
    name: String,
    path: PathBuf,
    engine: Box<dyn Engine>,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl KvStore {
    /// Open (or create) a redb-backed store in `dir`. The directory is
    /// created if missing.
    pub fn open(name: impl Into<String>, dir: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let dir = dir.as_ref();
        let open_failed = |reason: String| Error::StoreOpenFailed {
            name: name.clone(),
            reason,
        };

        std::fs::create_dir_all(dir).map_err(|e| open_failed(e.to_string()))?;
        let engine = RedbEngine::open(dir).map_err(|e| open_failed(e.to_string()))?;

        Ok(Self::with_engine(name, dir, Box::new(engine)))
    }

    /// Wrap an already-open engine.
    pub fn with_engine(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        engine: Box<dyn Engine>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory owned by this store's engine
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a payload as text. `Ok(None)` if the key was never written.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        match self.read_record(key)? {
            Some(record) => Ok(Some(record.into_payload_string(key)?)),
            None => Ok(None),
        }
    }

    /// Read the full decoded record, including its format and timestamp.
    pub fn read_record(&self, key: &str) -> Result<Option<Record>> {
        match self.engine.get(key)? {
            Some(bytes) => Ok(Some(codec::decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Upsert `payload` under `key`, stamped with the current time.
    pub fn write(&self, key: &str, payload: &str) -> Result<()> {
        self.write_at(key, payload, codec::now_secs())
    }

    /// Upsert with an explicit creation time.
    pub fn write_at(&self, key: &str, payload: &str, created_at: u64) -> Result<()> {
        self.engine.put(key, &codec::encode(payload, created_at))
    }

    /// Write only if no record (of either format) exists for `key`.
    ///
    /// The existence check and the insert run in a single engine write, so
    /// of two concurrent callers for the same key exactly one succeeds.
    pub fn write_if_absent(&self, key: &str, payload: &str) -> Result<()> {
        let bytes = codec::encode(payload, codec::now_secs());
        if self.engine.put_if_absent(key, &bytes)? {
            Ok(())
        } else {
            debug!("Name {} already exists", key);
            Err(Error::DuplicateKey(key.to_string()))
        }
    }

    /// Remove `key`. Deleting an absent key is a no-op.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.engine.delete(key)
    }

    /// Remove `key` only if it belongs to `namespace`. The check happens
    /// before the engine is touched.
    pub fn delete_in_namespace(&self, key: &str, namespace: KeyNamespace) -> Result<()> {
        if !namespace.contains(key) {
            return Err(Error::InvalidKeyNamespace {
                key: key.to_string(),
                prefix: namespace.prefix().to_string(),
            });
        }
        self.engine.delete(key)
    }

    /// Remove the DKG Diffie-Hellman key stored for `name`.
    pub fn delete_dh_dkg_key(&self, name: &str) -> Result<()> {
        let full_key = format!("{}{name}", KeyNamespace::DkgDhKey.prefix());
        self.delete_in_namespace(&full_key, KeyNamespace::DkgDhKey)
    }

    /// Remove a temporary network-exchange key.
    pub fn delete_temp_nek(&self, key: &str) -> Result<()> {
        self.delete_in_namespace(key, KeyNamespace::TempNek)
    }

    /// Visit up to `max_keys` keys in engine order. Values are not loaded.
    /// Returns the number of keys visited.
    pub fn visit_keys(&self, visitor: &mut dyn KeyVisitor, max_keys: u64) -> Result<u64> {
        if max_keys == 0 {
            return Ok(0);
        }
        let mut visited = 0u64;
        self.engine.scan_keys(&mut |key| {
            visitor.visit_key(key);
            visited += 1;
            if visited >= max_keys {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(visited)
    }

    /// Collect up to `max_keys` keys in engine order.
    pub fn list_keys(&self, max_keys: u64) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.visit_keys(&mut |key: &str| keys.push(key.to_string()), max_keys)?;
        Ok(keys)
    }

    /// Render every record for auditing.
    ///
    /// Corrupt records are logged and skipped rather than failing the scan.
    pub fn dump_all(&self) -> Result<DumpReport> {
        let mut report = DumpReport::default();
        self.engine.scan(&mut |key, bytes| {
            let record = match codec::decode(key, bytes) {
                Ok(record) => record,
                Err(e) => {
                    warn!(store = %self.name, "Skipping record in dump: {}", e);
                    report.skipped += 1;
                    return ControlFlow::Continue(());
                }
            };
            let payload = String::from_utf8_lossy(&record.payload);
            let line = match record.created_at {
                Some(ts) => format!(
                    "KEY: {key}, VALUE: {payload}, TIMESTAMP: {}\n",
                    codec::render_timestamp(ts)
                ),
                None => format!("KEY: {key}, VALUE: {payload}\n"),
            };
            report.text.push_str(&line);
            report.count += 1;
            ControlFlow::Continue(())
        })?;
        Ok(report)
    }

    /// Find the versioned record with the greatest creation time.
    ///
    /// Legacy records carry no timestamp and are ignored; so are corrupt
    /// ones. `None` means no versioned record exists. On ties the first key
    /// in engine order wins.
    pub fn latest_created(&self) -> Result<Option<LatestRecord>> {
        let mut latest: Option<LatestRecord> = None;
        self.engine.scan(&mut |key, bytes| {
            match codec::decode(key, bytes) {
                Ok(Record {
                    created_at: Some(ts),
                    ..
                }) => {
                    if latest.as_ref().is_none_or(|l| ts > l.created_at) {
                        latest = Some(LatestRecord {
                            key: key.to_string(),
                            created_at: ts,
                        });
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(store = %self.name, "Skipping record in scan: {}", e),
            }
            ControlFlow::Continue(())
        })?;
        Ok(latest)
    }

    /// Format of the record stored under `key`, if any
    pub fn record_format(&self, key: &str) -> Result<Option<RecordFormat>> {
        Ok(self.read_record(key)?.map(|r| r.format()))
    }

    /// Number of records in the store
    pub fn len(&self) -> Result<u64> {
        self.engine.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
