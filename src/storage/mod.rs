//! Durable key/value storage for form fields
//!
//! Every form field is mirrored into a [`FieldStore`] as a plain string under
//! a fixed key (see [`keys`]). A missing key means the field is empty. The
//! default backend is an embedded `sled` database in the user's data
//! directory; [`MemoryFieldStore`] is an in-process stand-in.

use crate::error::{Result, TokenSendError};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage keys, one per persisted field.
pub mod keys {
    /// Connected account shown as the sender
    pub const SENDER_ADDRESS: &str = "senderAddress";
    /// Transfer recipient
    pub const RECIPIENT_ADDRESS: &str = "recipientAddress";
    /// Decimal amount string as typed
    pub const TOKEN_AMOUNT: &str = "tokenAmount";
    /// ERC20 contract address
    pub const CONTRACT_ADDRESS: &str = "contractAddress";
    /// Hash of the in-flight transaction
    pub const TRANSACTION_HASH: &str = "transactionHash";
    /// Rough confirmation estimate in seconds
    pub const ESTIMATED_TRANSACTION_TIME: &str = "estimatedTransactionTime";

    /// Every key written by the form, in display order.
    pub const ALL: [&str; 6] = [
        SENDER_ADDRESS,
        RECIPIENT_ADDRESS,
        TOKEN_AMOUNT,
        CONTRACT_ADDRESS,
        TRANSACTION_HASH,
        ESTIMATED_TRANSACTION_TIME,
    ];
}

/// Synchronous string key/value store.
///
/// Writes are durable when the call returns.
pub trait FieldStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Field store backed by an embedded `sled` database
#[derive(Debug)]
pub struct SledFieldStore {
    db: sled::Db,
    path: PathBuf,
}

impl SledFieldStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `TokenSendError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use tokensend::storage::{FieldStore, SledFieldStore};
    ///
    /// # fn main() -> tokensend::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let store = SledFieldStore::open(dir.path().join("fields"))?;
    /// store.set("tokenAmount", "1.5")?;
    /// assert_eq!(store.get("tokenAmount")?.as_deref(), Some("1.5"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TokenSendError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let db = sled::open(&path)
            .map_err(|e| TokenSendError::Storage(format!("Failed to open database: {}", e)))?;

        tracing::debug!(path = %path.display(), "Opened field store");
        Ok(Self { db, path })
    }

    /// Open the store at `path`, or in the platform data directory when
    /// no path is given
    pub fn open_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Self::open(Self::default_path()?),
        }
    }

    /// Default database location inside the user's data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "tokensend", "tokensend").ok_or_else(|| {
            TokenSendError::Storage("Could not determine data directory".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("fields"))
    }

    /// Location of the database on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| TokenSendError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

impl FieldStore for SledFieldStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| TokenSendError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let value = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    TokenSendError::Storage(format!("Value for {} is not UTF-8: {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| TokenSendError::Storage(format!("Insert failed: {}", e)))?;
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| TokenSendError::Storage(format!("Remove failed: {}", e)))?;
        self.flush()
    }
}

/// In-memory field store
#[derive(Debug, Default)]
pub struct MemoryFieldStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryFieldStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| TokenSendError::Storage("Memory store lock poisoned".to_string()).into())
    }
}

impl FieldStore for MemoryFieldStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
