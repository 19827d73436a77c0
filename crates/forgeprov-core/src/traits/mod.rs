//! Core traits for the reconciliation core
//!
//! This module defines the abstract interfaces that implementations plug into.
//!
//! - [`RemoteClient`]: get/create/update/delete against the remote service
//! - [`ResourceKind`]: static per-kind schema, derivation and import layout
//! - [`StateStore`]: persistent state management for idempotency

pub mod remote_client;
pub mod resource_kind;
pub mod state_store;

pub use remote_client::{RemoteClient, RemoteEntity, RemoteError, RemoteId};
pub use resource_kind::ResourceKind;
pub use state_store::{State, StateRecord, StateStore, StateStoreFactory};
