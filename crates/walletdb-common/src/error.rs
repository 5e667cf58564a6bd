//! Error types for walletdb
//!
//! A single-key lookup that finds nothing is never an error: it is an empty
//! result. Every variant here is a real failure that propagates to the
//! caller without retry.

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for walletdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for walletdb
#[derive(Debug, Error)]
pub enum Error {
    // Storage errors
    #[error("could not access database: {0}")]
    StorageUnavailable(String),

    #[error("corrupt record '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("data with this name already exists: {0}")]
    DuplicateKey(String),

    #[error("key '{key}' is outside the '{prefix}' namespace")]
    InvalidKeyNamespace { key: String, prefix: String },

    // Cache errors
    #[error("there is no such key in cache")]
    KeyNotFound,

    // Registry lifecycle errors
    #[error("store registry is not initialized")]
    NotInitialized,

    #[error("store registry is already initialized")]
    AlreadyInitialized,

    #[error("could not create data directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open store '{name}': {reason}")]
    StoreOpenFailed { name: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a storage-unavailable error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create a corrupt-record error
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Startup failures are fatal; the owning process should exit.
    #[must_use]
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            Self::DirectoryCreationFailed { .. } | Self::StoreOpenFailed { .. }
        )
    }

    /// Registry used out of order (programming error, not an I/O condition)
    #[must_use]
    pub fn is_lifecycle_misuse(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::AlreadyInitialized)
    }
}
