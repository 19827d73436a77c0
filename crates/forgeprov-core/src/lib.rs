// # forgeprov-core
//
// Validation and reconciliation core for declarative forge resources.
//
// ## Architecture Overview
//
// An orchestrator hands this library a typed configuration per resource
// instance; the library validates it, diffs it against stored state and
// drives a remote service client until the remote entity matches:
//
// - **Validator Set** (`validate`): pure predicates, all violations collected
// - **Attribute Normalizer** (`normalize`): canonical forms for comparison
// - **Resource Reconciler** (`reconciler`): per-instance create/update/replace/delete
// - **Import Resolver** (`import`): state synthesized from a remote identifier
// - **ProviderEngine** (`engine`): state persistence and per-instance ordering
// - **ResourceRegistry** (`registry`): resource kinds registered by name
//
// ## Design Principles
//
// 1. **Validate before touching the service**: invalid configurations never reach the client
// 2. **Idempotency**: an unchanged configuration performs zero remote calls
// 3. **One canonical path**: every remote payload becomes state through `State::from_remote`
// 4. **No partial commits**: state is written only after the service confirmed
// 5. **Library-First**: no logging subscriber, no retries, no global state

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod import;
pub mod normalize;
pub mod reconciler;
pub mod registry;
pub mod schema;
pub mod state;
pub mod traits;
pub mod validate;
pub mod value;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, StateStoreConfig};
pub use diff::Diff;
pub use engine::{Applied, ProviderEngine, ResourceAddress};
pub use error::{Error, Result, Target};
pub use reconciler::{Action, Instance, InstanceStatus, Plan, ReadOutcome, ReconcileEvent, Reconciler};
pub use registry::ResourceRegistry;
pub use schema::{Attribute, Mutability, Presence, Schema};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{RemoteClient, RemoteEntity, RemoteError, RemoteId, ResourceKind, State, StateStore};
pub use validate::{Violation, Violations};
pub use value::{AttrPath, AttrValue, Object, Value};
