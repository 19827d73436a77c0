// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Keeps resource state for the lifetime of the process only. Useful for
// tests, dry runs and embedders that persist state themselves.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The next run sees every instance as absent and plans a create, which the
//   remote service will typically reject as a duplicate; import the existing
//   entities to recover

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use forgeprov_core::state::MemoryStateStore;
/// use forgeprov_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     assert!(store.get_state("github_membership.alice").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_record(&self, address: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.inner.read().await.get(address).cloned())
    }

    async fn set_record(&self, address: &str, record: &StateRecord) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(address.to_string(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, address: &str) -> Result<(), Error> {
        self.inner.write().await.remove(address);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let mut addresses: Vec<String> = self.inner.read().await.keys().cloned().collect();
        addresses.sort();
        Ok(addresses)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for [`MemoryStateStore`]; takes no configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
