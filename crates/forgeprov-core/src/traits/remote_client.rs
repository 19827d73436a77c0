// # Remote Client Trait
//
// Defines the interface to the remote service that holds the actual entities.
//
// ## Responsibilities
//
// The client is the only component that talks to the service. It knows how to
// address each resource kind's endpoint, but nothing about diffs, state or
// validation. It performs exactly one call per method invocation: no retry,
// no backoff, no rate-limit handling.
//
// ## Usage
//
// ```rust,ignore
// use forgeprov_core::{Object, RemoteClient};
//
// let fields = Object::new().with("title", "laptop").with("key", key);
// let entity = client.create("github_user_ssh_key", &fields).await?;
// println!("created {}", entity.id);
// ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Object;

/// Service-assigned identifier of a remote entity
///
/// Composite identifiers (e.g. `acme:octocat`) are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RemoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An entity as returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    /// Identifier for later get/update/delete calls
    pub id: RemoteId,
    /// Attributes as reported by the service (not yet normalized)
    pub attributes: Object,
}

impl RemoteEntity {
    /// Create an entity
    pub fn new(id: impl Into<RemoteId>, attributes: Object) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }
}

/// Structured failure reported by a remote client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation collides with existing remote state (e.g. a duplicate)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The service refused the request (e.g. malformed content)
    #[error("rejected: {0}")]
    Rejected(String),

    /// Temporary failure; the same call may succeed later
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Trait for remote service clients
///
/// # Thread Safety
///
/// A single client is shared by every concurrently reconciled instance.
/// Implementations must be safe to call concurrently.
///
/// # Cancellation
///
/// Callers may drop a returned future before it completes. Implementations
/// must not rely on running to completion for their own consistency.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch an entity
    ///
    /// # Parameters
    ///
    /// - `kind`: resource kind type name (e.g. `github_membership`)
    /// - `id`: identifier returned by an earlier create or import
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteEntity)`: the entity as the service reports it
    /// - `Err(RemoteError::NotFound)`: the entity does not exist
    /// - `Err(RemoteError)`: any other failure
    async fn get(&self, kind: &str, id: &RemoteId) -> Result<RemoteEntity, RemoteError>;

    /// Create an entity
    ///
    /// # Parameters
    ///
    /// - `kind`: resource kind type name
    /// - `fields`: configurable attributes, already normalized
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteEntity)`: the created entity, including service-computed attributes
    /// - `Err(RemoteError)`: the service refused or failed the request
    async fn create(&self, kind: &str, fields: &Object) -> Result<RemoteEntity, RemoteError>;

    /// Update an entity in place
    ///
    /// # Parameters
    ///
    /// - `kind`: resource kind type name
    /// - `id`: identifier of the entity
    /// - `changed`: only the attributes that changed; explicit nulls clear an attribute
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteEntity)`: the entity after the update (may be partial)
    /// - `Err(RemoteError)`: the service refused or failed the request
    async fn update(
        &self,
        kind: &str,
        id: &RemoteId,
        changed: &Object,
    ) -> Result<RemoteEntity, RemoteError>;

    /// Delete an entity
    ///
    /// # Returns
    ///
    /// - `Ok(())`: deleted
    /// - `Err(RemoteError::NotFound)`: the entity was already gone
    /// - `Err(RemoteError)`: any other failure
    async fn delete(&self, kind: &str, id: &RemoteId) -> Result<(), RemoteError>;

    /// Get the client name (for logging)
    fn client_name(&self) -> &'static str;
}
