//! Plugin-based resource registry
//!
//! Resource kinds and state store factories are registered at runtime by
//! name, so the engine never hardcodes which kinds exist.
//!
//! ## Registration
//!
//! Kind crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In the forgeprov-github crate
//! pub fn register(registry: &ResourceRegistry) {
//!     registry.register_kind(Arc::new(UserSshKey::new()));
//!     registry.register_kind(Arc::new(Membership::new()));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::StateStoreConfig;
use crate::error::{Error, Result};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{ResourceKind, StateStore, StateStoreFactory};

/// Registry of resource kinds and state store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ResourceRegistry {
    /// Registered resource kinds, by type name
    kinds: RwLock<HashMap<String, Arc<dyn ResourceKind>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` state stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_state_store("memory", Box::new(MemoryStateStoreFactory));
        registry.register_state_store("file", Box::new(FileStateStoreFactory));
        registry
    }

    /// Register a resource kind under its type name
    ///
    /// Registering the same type name again replaces the previous kind.
    pub fn register_kind(&self, kind: Arc<dyn ResourceKind>) {
        let name = kind.type_name().to_string();
        debug!("Registering resource kind {}", name);
        self.kinds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, kind);
    }

    /// Look up a resource kind
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn ResourceKind>)`: the registered kind
    /// - `Err(Error::UnknownKind)`: nothing registered under `name`
    pub fn kind(&self, name: &str) -> Result<Arc<dyn ResourceKind>> {
        self.kinds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownKind(name.to_string()))
    }

    /// List all registered kind names, sorted
    pub fn list_kinds(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .kinds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Check if a resource kind is registered
    pub fn has_kind(&self, name: &str) -> bool {
        self.kinds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Register a state store factory
    ///
    /// # Parameters
    ///
    /// - `name`: State store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating state store instances
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        self.state_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StateStore>)`: Created state store instance
    /// - `Err(Error::Config)`: store type not registered or configuration invalid
    /// - `Err(Error)`: the factory failed
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        config.validate()?;

        // Clone the factory out so the lock is not held across the await.
        let factory = self
            .state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(config.type_name())
            .cloned()
            .ok_or_else(|| {
                Error::config(format!("Unknown state store type: {}", config.type_name()))
            })?;

        factory.create(&config.factory_config()).await
    }

    /// List all registered state store types, sorted
    pub fn list_state_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        self.state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
