//! Configuration types for the provider
//!
//! Only the provider's own settings live here. Per-resource configurations are
//! supplied by the orchestrator on every call as [`Object`](crate::Object)s.
//!
//! ```json
//! {
//!   "state_store": { "type": "file", "path": "/var/lib/forgeprov/state.json" },
//!   "engine": { "refresh_before_apply": true }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Main provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ProviderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given state store
    pub fn with_state_store(mut self, state_store: StateStoreConfig) -> Self {
        self.state_store = state_store;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.state_store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Name of the factory that builds this store
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }

    /// Configuration handed to the factory
    pub fn factory_config(&self) -> serde_json::Value {
        match self {
            StateStoreConfig::File { path } => serde_json::json!({ "path": path }),
            StateStoreConfig::Memory => serde_json::Value::Null,
            StateStoreConfig::Custom { config, .. } => config.clone(),
        }
    }

    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } => {
                if path.trim().is_empty() {
                    return Err(crate::Error::config("State file path cannot be empty"));
                }
                Ok(())
            }
            StateStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom state store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom state store config cannot be null",
                    ));
                }
                Ok(())
            }
            StateStoreConfig::Memory => Ok(()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Read the remote entity before planning an apply
    ///
    /// Out-of-band changes then become the diff baseline.
    #[serde(default = "default_refresh_before_apply")]
    pub refresh_before_apply: bool,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            refresh_before_apply: default_refresh_before_apply(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_refresh_before_apply() -> bool {
    true
}
