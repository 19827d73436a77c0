//! Import resolver
//!
//! Synthesizes a first state for an entity that already exists remotely,
//! given nothing but its identifier. The state goes through the same
//! [`State::from_remote`] path as a create followed by a read, so an imported
//! instance cannot be told apart from one this system created.
//!
//! Composite identifiers are split on [`IMPORT_ID_SEPARATOR`]:
//!
//! ```rust
//! use forgeprov_core::import::split_import_id;
//!
//! let parts = split_import_id("acme:octocat", &["organization", "username"]).unwrap();
//! assert_eq!(parts, vec!["acme", "octocat"]);
//!
//! assert!(split_import_id("acme", &["organization", "username"]).is_err());
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result, Target};
use crate::traits::{RemoteClient, RemoteEntity, ResourceKind, State};

/// Separator between the parts of a composite import identifier
pub const IMPORT_ID_SEPARATOR: char = ':';

/// Human-readable layout of an identifier, e.g. `<organization>:<username>`
pub fn expected_layout(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| format!("<{p}>"))
        .collect::<Vec<_>>()
        .join(&IMPORT_ID_SEPARATOR.to_string())
}

/// Split an import identifier into exactly `parts.len()` non-empty parts
///
/// A single expected part takes the raw identifier as is (it may contain the
/// separator).
///
/// # Returns
///
/// - `Ok(Vec<&str>)`: the parts, in order
/// - `Err(Error::MalformedIdentifier)`: wrong number of parts or an empty part
pub fn split_import_id<'a>(raw: &'a str, parts: &[&str]) -> Result<Vec<&'a str>> {
    let split: Vec<&str> = if parts.len() <= 1 {
        vec![raw]
    } else {
        raw.split(IMPORT_ID_SEPARATOR).collect()
    };

    if split.len() != parts.len().max(1) || split.iter().any(|p| p.trim().is_empty()) {
        return Err(Error::malformed_identifier(raw, expected_layout(parts)));
    }
    Ok(split)
}

/// Resolves remote identifiers into states
pub struct ImportResolver {
    kind: Arc<dyn ResourceKind>,
    client: Arc<dyn RemoteClient>,
}

impl ImportResolver {
    /// Create a resolver for one resource kind
    pub fn new(kind: Arc<dyn ResourceKind>, client: Arc<dyn RemoteClient>) -> Self {
        Self { kind, client }
    }

    /// Fetch an existing entity and synthesize its state
    ///
    /// # Parameters
    ///
    /// - `address`: address the state will be stored under (used in errors)
    /// - `raw_id`: import identifier as supplied by the user
    ///
    /// # Returns
    ///
    /// - `Ok(State)`: canonical state, equal to create-then-read
    /// - `Err(Error::MalformedIdentifier)`: the identifier could not be parsed
    /// - `Err(Error::RemoteNotFound)`: no such entity
    pub async fn resolve(&self, address: &str, raw_id: &str) -> Result<State> {
        let layout = self.kind.import_id_parts();
        let parts = split_import_id(raw_id, layout)?;
        self.kind.check_import_parts(&parts).map_err(|reason| {
            Error::malformed_identifier(raw_id, format!("{} ({reason})", expected_layout(layout)))
        })?;

        let id = self.kind.remote_id_from_parts(&parts);
        debug!("Resolving import {} for {} as {}", raw_id, address, id);

        let entity = self
            .client
            .get(self.kind.type_name(), &id)
            .await
            .map_err(|e| Error::remote(e, Target::new(address).with_id(id.clone())))?;

        // Attributes implied by the identifier, overridden by what the service reports.
        let mut attributes = self.kind.seed_from_import(&parts);
        attributes.merge(entity.attributes);

        let state = State::from_remote(self.kind.as_ref(), RemoteEntity::new(entity.id, attributes));
        info!("Resolved import {} -> {}", raw_id, state.id);
        Ok(state)
    }
}
