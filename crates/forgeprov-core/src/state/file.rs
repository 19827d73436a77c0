// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: the whole file is written to `<name>.tmp`, then renamed
// - Backup: the previous file is copied to `<name>.backup` before each rename
// - Recovery: a file that no longer parses is replaced by its backup
//
// A failed write leaves the previous file in place, so the store never holds
// a state the service did not confirm.
//
// ## File Format
//
// Records are keyed by resource address and written in address order, so the
// same states always produce the same bytes.
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "github_membership.alice": {
//       "state": {
//         "kind": "github_membership",
//         "id": "acme:alice",
//         "attributes": { "organization": "acme", "role": "admin", "username": "alice" }
//       },
//       "last_updated": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore, StateStoreFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

type Records = BTreeMap<String, StateRecord>;

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use forgeprov_core::state::FileStateStore;
/// use forgeprov_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/forgeprov/state.json").await?;
///     for address in store.list_records().await? {
///         println!("{address}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    records: Records,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFileFormat {
    version: String,
    records: Records,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// Creates parent directories as needed. A corrupted file is recovered
    /// from its backup; if that fails too, the store starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                records,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<Records, Error> {
        let err = match Self::load(path).await {
            Ok(records) => {
                debug!("Loaded state from {}: {} records", path.display(), records.len());
                return Ok(records);
            }
            Err(err @ Error::Json(_)) => err,
            Err(err) => return Err(err),
        };

        warn!(
            "State file {} is corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            warn!("No backup file found. Starting with empty state.");
            return Ok(Records::new());
        }

        match Self::load(&backup_path).await {
            Ok(records) => {
                info!("Recovered state from backup: {} records", records.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    error!("Failed to restore state file from backup: {}", e);
                }
                Ok(records)
            }
            Err(backup_err) => {
                error!(
                    "Backup also unreadable: {}. Starting with empty state.",
                    backup_err
                );
                Ok(Records::new())
            }
        }
    }

    /// Parse errors surface as [`Error::Json`], everything else as [`Error::StateStore`]
    async fn load(path: &Path) -> Result<Records, Error> {
        if !path.exists() {
            debug!("State file does not exist: {}", path.display());
            return Ok(Records::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!("Failed to read state file {}: {}", path.display(), e))
        })?;

        let file: StateFileFormat = serde_json::from_str(&content)?;
        if file.version != STATE_FILE_VERSION {
            warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION, file.version
            );
        }

        Ok(file.records)
    }

    /// Write the whole state atomically
    ///
    /// Holds the write lock for the duration so concurrent writers cannot
    /// interleave their temp files.
    async fn write_state(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: guard.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {e}")))?;

        let temp_path = self.temp_path();
        {
            let mut tmp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            tmp.write_all(json.as_bytes()).await?;
            tmp.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        debug!("State written to {}", self.path.display());
        Ok(())
    }

    async fn mutate(&self, f: impl FnOnce(&mut Records)) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            f(&mut guard.records);
            guard.dirty = true;
        }
        self.write_state().await
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_record(&self, address: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.state.read().await.records.get(address).cloned())
    }

    async fn set_record(&self, address: &str, record: &StateRecord) -> Result<(), Error> {
        let record = record.clone();
        self.mutate(|records| {
            records.insert(address.to_string(), record);
        })
        .await
    }

    async fn delete_record(&self, address: &str) -> Result<(), Error> {
        self.mutate(|records| {
            records.remove(address);
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.records.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}

/// Factory for [`FileStateStore`]
///
/// Expects `{"path": "<state file>"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        let path = config
            .get("path")
            .and_then(serde_json::Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("file state store requires a non-empty \"path\""))?;
        Ok(Box::new(FileStateStore::new(path).await?))
    }
}
