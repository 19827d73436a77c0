//! Provider engine
//!
//! The ProviderEngine is responsible for:
//! - Resolving resource addresses to registered kinds
//! - Loading and persisting instance state
//! - Serializing operations on the same instance
//! - Running the reconciler and the import resolver
//!
//! ## Architecture
//!
//! ```text
//!                    apply / refresh / destroy / import
//!                                  │
//!                                  ▼
//!                        ┌──────────────────┐
//!                        │  ProviderEngine  │── per-address lock
//!                        └──────────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        │                         │                         │
//!        ▼                         ▼                         ▼
//! ┌─────────────┐         ┌──────────────────┐        ┌─────────────┐
//! │ StateStore  │         │ Reconciler /     │        │   Events    │
//! │ (load/save) │         │ ImportResolver   │        │  (notify)   │
//! └─────────────┘         └──────────────────┘        └─────────────┘
//!                                  │
//!                                  ▼
//!                           RemoteClient
//! ```
//!
//! ## Flow
//!
//! 1. Take the lock for the address
//! 2. Load the stored state into an [`Instance`]
//! 3. Validate, optionally refresh, then reconcile
//! 4. Persist whatever the instance holds once the reconciler returned
//!
//! Different addresses proceed in parallel; there is no global lock.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::import::ImportResolver;
use crate::reconciler::{Action, Instance, Plan, ReadOutcome, ReconcileEvent, Reconciler};
use crate::registry::ResourceRegistry;
use crate::traits::{RemoteClient, ResourceKind, State, StateStore};
use crate::value::Object;

/// Address of a resource instance: `<kind>.<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// Resource kind type name
    pub kind: String,
    /// Instance name, unique within the kind
    pub name: String,
}

impl ResourceAddress {
    /// Create an address
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl FromStr for ResourceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() => {
                Ok(Self::new(kind, name))
            }
            _ => Err(Error::config(format!(
                "Invalid resource address {s:?}: expected <kind>.<name>"
            ))),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// Outcome of a successful apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// What the reconciler did
    pub action: Action,
    /// The instance state afterwards
    pub state: Option<State>,
}

/// Core provider engine
///
/// ## Threading
///
/// All methods take `&self`; share the engine behind an `Arc` to reconcile
/// many instances concurrently. Operations on the same address queue behind
/// that address's lock.
pub struct ProviderEngine {
    /// Resource kinds and store factories
    registry: Arc<ResourceRegistry>,

    /// Remote service client shared by all instances
    client: Arc<dyn RemoteClient>,

    /// State store for idempotency
    state_store: Box<dyn StateStore>,

    /// Refresh before planning an apply
    refresh_before_apply: bool,

    /// One lock per resource address
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl ProviderEngine {
    /// Create a new provider engine
    ///
    /// # Parameters
    ///
    /// - `registry`: registry holding the resource kinds
    /// - `client`: remote service client
    /// - `state_store`: state store implementation
    /// - `config`: provider configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields reconcile events
    pub fn new(
        registry: Arc<ResourceRegistry>,
        client: Arc<dyn RemoteClient>,
        state_store: Box<dyn StateStore>,
        config: ProviderConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            registry,
            client,
            state_store,
            refresh_before_apply: config.engine.refresh_before_apply,
            locks: Mutex::new(HashMap::new()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Create an engine whose state store is built from `config.state_store`
    pub async fn from_config(
        registry: Arc<ResourceRegistry>,
        client: Arc<dyn RemoteClient>,
        config: ProviderConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        let state_store = registry.create_state_store(&config.state_store).await?;
        Self::new(registry, client, state_store, config)
    }

    /// Plan an apply without calling the remote service
    pub async fn plan(&self, address: &str, desired: &Object) -> Result<Plan> {
        let (reconciler, _) = self.reconciler(address)?;
        let instance = self.load_instance(address).await?;
        reconciler.plan(desired, &instance)
    }

    /// Converge an instance to `desired`
    ///
    /// # Returns
    ///
    /// - `Ok(Applied)`: the action taken and the resulting state
    /// - `Err(Error::ValidationFailed)`: nothing was sent to the remote service
    /// - `Err(Error)`: remote or storage failure
    pub async fn apply(&self, address: &str, desired: &Object) -> Result<Applied> {
        self.converge(address, desired, None).await
    }

    /// Like [`apply`](Self::apply), but abort when `cancel` fires
    ///
    /// Cancelling drops the in-flight remote call. Whatever the instance
    /// holds afterwards is still persisted, so operations confirmed before
    /// the cancellation are recorded and an unconfirmed one is not. Once
    /// the reconciler has returned the state write always completes. A
    /// dropped sender does not count as a cancellation.
    pub async fn apply_with_cancel(
        &self,
        address: &str,
        desired: &Object,
        cancel: oneshot::Receiver<()>,
    ) -> Result<Applied> {
        self.converge(address, desired, Some(cancel)).await
    }

    async fn converge(
        &self,
        address: &str,
        desired: &Object,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<Applied> {
        let (reconciler, _) = self.reconciler(address)?;
        reconciler.validate(desired)?;

        let lock = self.lock_for(address).await;
        let _guard = lock.lock().await;

        let mut instance = self.load_instance(address).await?;
        let before = instance.state.clone();
        let target = instance.target();

        let reconcile = async {
            if self.refresh_before_apply && instance.state.is_some() {
                reconciler.refresh(&mut instance).await?;
            }
            reconciler.apply(desired, &mut instance).await
        };

        // Only the reconcile step is cancellable; persisting below is not.
        let result = match cancel {
            Some(cancel) => {
                tokio::select! {
                    result = reconcile => result,
                    Ok(()) = cancel => {
                        info!("Apply of {} cancelled", address);
                        Err(Error::Cancelled(target))
                    }
                }
            }
            None => reconcile.await,
        };

        self.persist(&instance, before.as_ref(), result.is_ok()).await?;
        let action = result?;
        info!("Applied {} to {}", action, address);

        Ok(Applied {
            action,
            state: instance.state,
        })
    }

    /// Compare stored state with the remote entity and store the fresh baseline
    pub async fn refresh(&self, address: &str) -> Result<ReadOutcome> {
        let (reconciler, _) = self.reconciler(address)?;

        let lock = self.lock_for(address).await;
        let _guard = lock.lock().await;

        let mut instance = self.load_instance(address).await?;
        let before = instance.state.clone();
        let result = reconciler.refresh(&mut instance).await;
        self.persist(&instance, before.as_ref(), result.is_ok()).await?;
        result
    }

    /// Delete the remote entity and forget the instance
    ///
    /// The address's lock entry is dropped afterwards unless another
    /// operation is waiting on it.
    pub async fn destroy(&self, address: &str) -> Result<()> {
        let (reconciler, _) = self.reconciler(address)?;

        let lock = self.lock_for(address).await;
        let result = {
            let _guard = lock.lock().await;

            let mut instance = self.load_instance(address).await?;
            let before = instance.state.clone();
            let result = reconciler.destroy(&mut instance).await;
            self.persist(&instance, before.as_ref(), result.is_ok()).await?;
            result
        };

        self.release_lock(address, lock).await;
        result
    }

    /// Adopt an existing remote entity under `address`
    ///
    /// # Returns
    ///
    /// - `Ok(State)`: the synthesized state, now stored
    /// - `Err(Error::MalformedIdentifier)`: `raw_id` does not have the kind's layout
    /// - `Err(Error::RemoteNotFound)`: no such remote entity
    /// - `Err(Error::Config)`: the address already has state
    pub async fn import(&self, address: &str, raw_id: &str) -> Result<State> {
        let (reconciler, kind) = self.reconciler(address)?;

        let lock = self.lock_for(address).await;
        let _guard = lock.lock().await;

        let mut instance = self.load_instance(address).await?;
        if let Some(existing) = &instance.state {
            return Err(Error::config(format!(
                "{} is already managed (id {}); destroy or forget it before importing",
                address, existing.id
            )));
        }

        let resolver = ImportResolver::new(kind, self.client.clone());
        let state = resolver.resolve(address, raw_id).await?;
        reconciler.adopt(&mut instance, state.clone());
        self.persist(&instance, None, true).await?;
        Ok(state)
    }

    /// Stored state for an address
    pub async fn state(&self, address: &str) -> Result<Option<State>> {
        self.state_store.get_state(address).await
    }

    /// Flush the state store
    pub async fn flush(&self) -> Result<()> {
        self.state_store.flush().await
    }

    fn reconciler(&self, address: &str) -> Result<(Reconciler, Arc<dyn ResourceKind>)> {
        let address: ResourceAddress = address.parse()?;
        let kind = self.registry.kind(&address.kind)?;
        let reconciler = Reconciler::new(kind.clone(), self.client.clone())
            .with_events(self.event_tx.clone());
        Ok((reconciler, kind))
    }

    async fn lock_for(&self, address: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(address.to_string())
            .or_default()
            .clone()
    }

    /// Remove the address's lock entry if `lock` is its only other holder
    ///
    /// Clones are only handed out under the map lock, so the count cannot
    /// grow while it is checked.
    async fn release_lock(&self, address: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if locks.get(address).is_some_and(|held| Arc::ptr_eq(held, &lock))
            && Arc::strong_count(&lock) == 2
        {
            locks.remove(address);
            debug!("Released lock for {}", address);
        }
    }

    async fn load_instance(&self, address: &str) -> Result<Instance> {
        match self.state_store.get_state(address).await? {
            Some(state) => {
                let expected: ResourceAddress = address.parse()?;
                if state.kind != expected.kind {
                    return Err(Error::state_store(format!(
                        "State for {} belongs to kind {}",
                        address, state.kind
                    )));
                }
                Ok(Instance::with_state(address, state))
            }
            None => Ok(Instance::new(address)),
        }
    }

    /// Write the instance state back if it changed
    ///
    /// After a failed operation a storage error is logged rather than
    /// returned, so the caller sees the reconcile error.
    async fn persist(&self, instance: &Instance, before: Option<&State>, succeeded: bool) -> Result<()> {
        if instance.state.as_ref() == before {
            return Ok(());
        }

        let result = match &instance.state {
            Some(state) => {
                debug!("Storing state for {}", instance.address);
                self.state_store.set_state(&instance.address, state).await
            }
            None => {
                debug!("Removing state for {}", instance.address);
                self.state_store.delete_record(&instance.address).await
            }
        };

        match result {
            Err(e) if !succeeded => {
                error!("Failed to persist state for {}: {}", instance.address, e);
                Ok(())
            }
            other => other,
        }
    }
}
