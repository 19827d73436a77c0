//! Resource reconciler
//!
//! The reconciler drives one resource instance from its stored state towards
//! a desired configuration:
//!
//! ```text
//!            create                 update / no-op
//! absent ───────────▶ created ◀──────────────────┐
//!   ▲                  │  │ └───────────────────┘
//!   │ create failed    │  │ replace
//!   │ after destroy    │  ▼
//!   └────────────── planned (destroy, then create)
//!                      │
//!                      │ destroy
//!                      ▼
//!                   deleted
//! ```
//!
//! A refresh that finds the remote entity changed out of band moves the
//! instance to `drifted` and makes the fresh entity the new baseline. The
//! reconciler never resolves drift on its own.
//!
//! ## Guarantees
//!
//! - A configuration that fails validation never reaches the remote client
//! - An empty diff performs zero remote calls
//! - Instance state is only written after the remote call succeeded; dropping
//!   an in-flight future leaves the state untouched
//! - Replace is always destroy-then-create

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::diff::Diff;
use crate::error::{Error, Result, Target};
use crate::normalize::normalize_object;
use crate::traits::{RemoteClient, RemoteEntity, RemoteError, RemoteId, ResourceKind, State};
use crate::validate::{require_known, validate_object};
use crate::value::Object;

/// Lifecycle position of a resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// No remote entity is tracked
    Absent,
    /// A replace is in progress
    Planned,
    /// The remote entity exists and matches the stored state
    Created,
    /// The remote entity was changed out of band; state holds the fresh baseline
    Drifted,
    /// The remote entity was deleted through this system
    Deleted,
}

/// One resource instance: address, stored state and lifecycle status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Resource address (`kind.name`)
    pub address: String,
    /// Last confirmed state, if any
    pub state: Option<State>,
    /// Lifecycle status
    pub status: InstanceStatus,
}

impl Instance {
    /// An instance with no remote entity
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: None,
            status: InstanceStatus::Absent,
        }
    }

    /// An instance restored from stored state
    pub fn with_state(address: impl Into<String>, state: State) -> Self {
        Self {
            address: address.into(),
            state: Some(state),
            status: InstanceStatus::Created,
        }
    }

    /// Remote identifier, if the entity exists
    pub fn id(&self) -> Option<&RemoteId> {
        self.state.as_ref().map(|s| &s.id)
    }

    /// Error target for this instance
    pub fn target(&self) -> Target {
        let target = Target::new(&self.address);
        match self.id() {
            Some(id) => target.with_id(id.clone()),
            None => target,
        }
    }

    fn clear(&mut self, status: InstanceStatus) {
        self.state = None;
        self.status = status;
    }
}

/// What applying a configuration does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create the remote entity
    Create,
    /// Update changed attributes in place
    Update,
    /// Destroy the remote entity, then create it again
    Replace,
    /// Nothing to do
    NoOp,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::NoOp => "no-op",
        };
        f.write_str(name)
    }
}

/// Planned action together with the diff it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Action to take
    pub action: Action,
    /// Attribute-level changes
    pub diff: Diff,
}

/// Result of comparing stored state with a fresh read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The remote entity matches the stored state
    Unchanged,
    /// The remote entity changed out of band; the instance now holds the fresh state
    Drifted {
        /// State before the refresh
        previous: State,
    },
    /// The remote entity no longer exists (or was never tracked)
    Gone,
}

/// Events emitted by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Remote entity created
    Created { address: String, id: RemoteId },

    /// Remote entity updated in place
    Updated {
        address: String,
        id: RemoteId,
        changed: Vec<String>,
    },

    /// Remote entity destroyed and created again
    Replaced {
        address: String,
        previous_id: RemoteId,
        id: RemoteId,
    },

    /// Configuration already matched (no remote call)
    Unchanged { address: String },

    /// Remote entity deleted (or already gone)
    Deleted { address: String },

    /// Out-of-band change detected on refresh
    Drifted { address: String, id: RemoteId },

    /// Remote entity disappeared out of band
    Gone { address: String },

    /// Instance state synthesized from an existing remote entity
    Imported { address: String, id: RemoteId },

    /// An operation failed
    Failed { address: String, error: String },
}

/// Per-kind reconciler
///
/// Cheap to clone; the kind and client are shared.
#[derive(Clone)]
pub struct Reconciler {
    kind: Arc<dyn ResourceKind>,
    client: Arc<dyn RemoteClient>,
    event_tx: Option<mpsc::Sender<ReconcileEvent>>,
}

impl Reconciler {
    /// Create a reconciler for one resource kind
    pub fn new(kind: Arc<dyn ResourceKind>, client: Arc<dyn RemoteClient>) -> Self {
        Self {
            kind,
            client,
            event_tx: None,
        }
    }

    /// Emit events on the given channel
    pub fn with_events(mut self, event_tx: mpsc::Sender<ReconcileEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// The resource kind
    pub fn kind(&self) -> &dyn ResourceKind {
        self.kind.as_ref()
    }

    /// The remote client
    pub fn client(&self) -> &Arc<dyn RemoteClient> {
        &self.client
    }

    /// Validate a configuration
    ///
    /// Runs the schema checks and the kind's cross-field checks and collects
    /// every violation.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the configuration may be applied
    /// - `Err(Error::ValidationFailed)`: all violations found
    pub fn validate(&self, desired: &Object) -> Result<()> {
        let mut violations = validate_object(self.kind.schema(), desired);
        self.kind.validate(desired, &mut violations);
        violations.into_result()
    }

    /// Decide what applying `desired` to `instance` would do
    ///
    /// Validates first; no remote call is made.
    pub fn plan(&self, desired: &Object, instance: &Instance) -> Result<Plan> {
        self.validate(desired)?;

        let plan = match &instance.state {
            None => Plan {
                action: Action::Create,
                diff: Diff::compute(self.kind.schema(), desired, &Object::new()),
            },
            Some(state) => {
                let diff = Diff::compute(self.kind.schema(), desired, &state.attributes);
                let action = if diff.is_empty() {
                    Action::NoOp
                } else if diff.requires_replace() {
                    Action::Replace
                } else {
                    Action::Update
                };
                Plan { action, diff }
            }
        };

        debug!("Planned {} for {}: {}", plan.action, instance.address, plan.diff);
        Ok(plan)
    }

    /// Apply a configuration to an instance
    ///
    /// # Parameters
    ///
    /// - `desired`: configuration to converge to
    /// - `instance`: the instance; updated only after the remote confirmed
    ///
    /// # Returns
    ///
    /// - `Ok(Action)`: what was done
    /// - `Err(Error)`: validation or remote failure; see [`Error`]
    pub async fn apply(&self, desired: &Object, instance: &mut Instance) -> Result<Action> {
        let result = self.apply_inner(desired, instance).await;
        if let Err(e) = &result {
            self.report_failure(&instance.address, e);
        }
        result
    }

    async fn apply_inner(&self, desired: &Object, instance: &mut Instance) -> Result<Action> {
        let plan = self.plan(desired, instance)?;

        match plan.action {
            Action::NoOp => {
                debug!("{} is up to date", instance.address);
                instance.status = InstanceStatus::Created;
                self.emit_event(ReconcileEvent::Unchanged {
                    address: instance.address.clone(),
                });
            }
            Action::Create => {
                let fields = self.create_fields(desired)?;
                self.create(fields, instance).await?;
            }
            Action::Update => {
                let changed = plan.diff.changed_fields();
                require_known(&changed).into_result()?;
                self.update(changed, instance).await?;
            }
            Action::Replace => {
                // Checked before the destroy so an unusable configuration
                // never costs the existing entity.
                let fields = self.create_fields(desired)?;
                self.replace(fields, instance).await?;
            }
        }

        Ok(plan.action)
    }

    /// Compare stored state with the remote entity
    ///
    /// On drift the fresh, canonical state replaces the stored one and the
    /// instance is marked [`InstanceStatus::Drifted`]. A remote "not found"
    /// clears the instance.
    pub async fn refresh(&self, instance: &mut Instance) -> Result<ReadOutcome> {
        let result = self.refresh_inner(instance).await;
        if let Err(e) = &result {
            self.report_failure(&instance.address, e);
        }
        result
    }

    async fn refresh_inner(&self, instance: &mut Instance) -> Result<ReadOutcome> {
        let Some(stored) = instance.state.clone() else {
            return Ok(ReadOutcome::Gone);
        };

        let entity = match self.client.get(self.kind.type_name(), &stored.id).await {
            Ok(entity) => entity,
            Err(RemoteError::NotFound(message)) => {
                warn!("{} no longer exists remotely: {}", instance.target(), message);
                instance.clear(InstanceStatus::Absent);
                self.emit_event(ReconcileEvent::Gone {
                    address: instance.address.clone(),
                });
                return Ok(ReadOutcome::Gone);
            }
            Err(e) => return Err(Error::remote(e, instance.target())),
        };

        let fresh = State::from_remote(self.kind.as_ref(), entity);
        if fresh == stored {
            debug!("{} matches remote", instance.address);
            instance.status = InstanceStatus::Created;
            return Ok(ReadOutcome::Unchanged);
        }

        info!("Drift detected on {}", instance.target());
        self.emit_event(ReconcileEvent::Drifted {
            address: instance.address.clone(),
            id: fresh.id.clone(),
        });
        instance.state = Some(fresh);
        instance.status = InstanceStatus::Drifted;
        Ok(ReadOutcome::Drifted { previous: stored })
    }

    /// Delete the remote entity
    ///
    /// A remote "not found" counts as success, so destroying twice is fine.
    pub async fn destroy(&self, instance: &mut Instance) -> Result<()> {
        let result = self.destroy_inner(instance).await;
        if let Err(e) = &result {
            self.report_failure(&instance.address, e);
        }
        result
    }

    async fn destroy_inner(&self, instance: &mut Instance) -> Result<()> {
        if instance.state.is_some() {
            self.delete_remote(instance).await?;
        } else {
            debug!("{} has no remote entity, nothing to destroy", instance.address);
        }

        instance.clear(InstanceStatus::Deleted);
        self.emit_event(ReconcileEvent::Deleted {
            address: instance.address.clone(),
        });
        Ok(())
    }

    /// Record an imported state on an instance
    pub(crate) fn adopt(&self, instance: &mut Instance, state: State) {
        info!("Imported {} as {}", state.id, instance.address);
        self.emit_event(ReconcileEvent::Imported {
            address: instance.address.clone(),
            id: state.id.clone(),
        });
        instance.state = Some(state);
        instance.status = InstanceStatus::Created;
    }

    /// Configurable, known, normalized attributes for a create call
    fn create_fields(&self, desired: &Object) -> Result<Object> {
        let schema = self.kind.schema();
        let fields: Object = normalize_object(schema, desired.clone())
            .into_iter()
            .filter(|(name, value)| {
                !value.is_null() && schema.attribute(name).is_some_and(|a| a.is_configurable())
            })
            .collect();
        require_known(&fields).into_result()?;
        Ok(fields)
    }

    async fn create(&self, fields: Object, instance: &mut Instance) -> Result<()> {
        info!("Creating {}", instance.address);

        let entity = self
            .client
            .create(self.kind.type_name(), &fields)
            .await
            .map_err(|e| Error::remote(e, instance.target()))?;

        let state = State::from_remote(self.kind.as_ref(), entity);
        info!("Created {} (id {})", instance.address, state.id);
        self.emit_event(ReconcileEvent::Created {
            address: instance.address.clone(),
            id: state.id.clone(),
        });
        instance.state = Some(state);
        instance.status = InstanceStatus::Created;
        Ok(())
    }

    async fn update(&self, changed: Object, instance: &mut Instance) -> Result<()> {
        let stored = instance.state.clone().ok_or_else(|| {
            Error::Other(format!("{} has no state to update", instance.address))
        })?;
        let names: Vec<String> = changed.names().map(str::to_string).collect();
        info!("Updating {}: {}", instance.target(), names.join(", "));

        let response = self
            .client
            .update(self.kind.type_name(), &stored.id, &changed)
            .await
            .map_err(|e| Error::remote(e, instance.target()))?;

        // The response may be partial: overlay what was sent, then what came back.
        let mut attributes = stored.attributes;
        attributes.merge(changed);
        attributes.merge(response.attributes);
        let state = State::from_remote(
            self.kind.as_ref(),
            RemoteEntity::new(stored.id, attributes),
        );

        self.emit_event(ReconcileEvent::Updated {
            address: instance.address.clone(),
            id: state.id.clone(),
            changed: names,
        });
        instance.state = Some(state);
        instance.status = InstanceStatus::Created;
        Ok(())
    }

    async fn replace(&self, fields: Object, instance: &mut Instance) -> Result<()> {
        let previous_id = instance
            .id()
            .cloned()
            .ok_or_else(|| Error::Other(format!("{} has no state to replace", instance.address)))?;

        info!("Replacing {}: destroying before create", instance.target());
        instance.status = InstanceStatus::Planned;
        if let Err(e) = self.delete_remote(instance).await {
            error!("Destroy step of replace failed for {}: {}", instance.target(), e);
            instance.status = InstanceStatus::Created;
            return Err(e);
        }
        instance.clear(InstanceStatus::Absent);

        if let Err(e) = self.create(fields, instance).await {
            error!(
                "Create step of replace failed for {} (replaced id {}), instance is now absent: {}",
                instance.address, previous_id, e
            );
            return Err(e.with_target_id(previous_id));
        }

        if let Some(id) = instance.id() {
            self.emit_event(ReconcileEvent::Replaced {
                address: instance.address.clone(),
                previous_id,
                id: id.clone(),
            });
        }
        Ok(())
    }

    async fn delete_remote(&self, instance: &Instance) -> Result<()> {
        let Some(id) = instance.id() else {
            return Ok(());
        };
        info!("Deleting {}", instance.target());

        match self.client.delete(self.kind.type_name(), id).await {
            Ok(()) => Ok(()),
            Err(RemoteError::NotFound(message)) => {
                debug!("{} was already gone: {}", instance.target(), message);
                Ok(())
            }
            Err(e) => Err(Error::remote(e, instance.target())),
        }
    }

    fn report_failure(&self, address: &str, err: &Error) {
        warn!("Reconcile of {} failed: {}", address, err);
        self.emit_event(ReconcileEvent::Failed {
            address: address.to_string(),
            error: err.to_string(),
        });
    }

    /// Emit an event (non-blocking)
    ///
    /// Events are dropped with a warning when the channel is full.
    fn emit_event(&self, event: ReconcileEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        if tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
