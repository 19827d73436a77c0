// # State Store Trait
//
// Defines the interface for persistent state management.
//
// ## Purpose
//
// The state store records, per resource address (`kind.name`):
// - The remote identifier of the entity
// - The canonical attributes last confirmed by the service
// - When the state was last written
//
// Only states confirmed by the service are ever written. A create whose
// response never arrived leaves nothing behind.
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`, for tests and short-lived runs
// - File-based: `FileStateStore`, versioned JSON with backup recovery

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::{RemoteEntity, RemoteId, ResourceKind};
use crate::value::Object;

/// Last-known-good state of one resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Resource kind type name
    pub kind: String,
    /// Remote identifier
    pub id: RemoteId,
    /// Canonical attributes, including computed ones
    pub attributes: Object,
}

impl State {
    /// Build the state for a remote entity
    ///
    /// This is the only way remote payloads become state.
    pub fn from_remote(kind: &dyn ResourceKind, entity: RemoteEntity) -> Self {
        Self {
            kind: kind.type_name().to_string(),
            id: entity.id,
            attributes: kind.canonicalize(entity.attributes),
        }
    }
}

/// State record as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    /// The instance state
    pub state: State,
    /// Timestamp of the last write
    pub last_updated: DateTime<Utc>,
}

impl StateRecord {
    /// Create a new state record stamped with the current time
    ///
    /// # Visibility
    ///
    /// This is `pub(crate)` so records are only created by the engine or by
    /// `StateStore` implementations.
    pub(crate) fn new(state: State) -> Self {
        Self {
            state,
            last_updated: Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Per-address ordering is provided by the engine, not by the store.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: the store never decides what to write
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the full state record
    ///
    /// # Parameters
    ///
    /// - `address`: resource address (`kind.name`)
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StateRecord))`: the stored record
    /// - `Ok(None)`: nothing stored for this address
    /// - `Err(Error)`: storage error
    async fn get_record(&self, address: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Write a full state record
    ///
    /// # Returns
    ///
    /// - `Ok(())`: stored
    /// - `Err(Error)`: storage error
    async fn set_record(&self, address: &str, record: &StateRecord) -> Result<(), crate::Error>;

    /// Delete a state record
    ///
    /// # Returns
    ///
    /// - `Ok(())`: deleted (or didn't exist)
    /// - `Err(Error)`: storage error
    async fn delete_record(&self, address: &str) -> Result<(), crate::Error>;

    /// List all addresses in the store
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures
    /// all changes are flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Get the stored state, without metadata
    async fn get_state(&self, address: &str) -> Result<Option<State>, crate::Error> {
        Ok(self.get_record(address).await?.map(|record| record.state))
    }

    /// Store a state, stamped with the current time
    async fn set_state(&self, address: &str, state: &State) -> Result<(), crate::Error> {
        self.set_record(address, &StateRecord::new(state.clone()))
            .await
    }
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: configuration specific to this state store
    ///
    /// # Returns
    ///
    /// A boxed StateStore trait object
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, crate::Error>;
}
