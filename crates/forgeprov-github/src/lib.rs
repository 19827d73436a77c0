// # GitHub Resource Kinds
//
// This crate provides the GitHub resource kinds for the forgeprov
// reconciliation core.
//
// ## Kinds
//
// | Type name                       | Import identifier           |
// |---------------------------------|-----------------------------|
// | `github_user_ssh_key`           | `<id>`                      |
// | `github_membership`             | `<organization>:<username>` |
// | `github_actions_variable`       | `<repository>:<variable_name>` |
// | `github_repository_environment` | `<repository>:<environment>` |
//
// ## What lives here
//
// - Attribute schemas: types, presence, mutability, validators, normalizers
// - Cross-field rules that do not fit one attribute
// - Import identifier layouts and the remote identifiers they map to
// - Mapping of HTTP status codes and JSON payloads to the core's types
//
// ## What does not
//
// - The HTTP client itself (supplied by the embedder as a `RemoteClient`)
// - Retries, backoff and rate limiting (owned by the embedder)
// - State (owned by the engine's `StateStore`)
//
// ## API Reference
//
// - SSH keys: `/user/keys/{key_id}`
// - Memberships: `/orgs/{org}/memberships/{username}`
// - Actions variables: `/repos/{owner}/{repo}/actions/variables/{name}`
// - Environments: `/repos/{owner}/{repo}/environments/{environment_name}`

use std::sync::Arc;

use forgeprov_core::import::IMPORT_ID_SEPARATOR;
use forgeprov_core::{RemoteId, ResourceRegistry};

pub mod actions_variable;
pub mod environment;
pub mod membership;
pub mod payload;
pub mod ssh_key;

pub use actions_variable::ActionsVariable;
pub use environment::RepositoryEnvironment;
pub use membership::Membership;
pub use payload::{classify_status, entity_from_json, request_body};
pub use ssh_key::UserSshKey;

/// Prefix GitHub reserves for its own variable and secret names
pub const RESERVED_NAME_PREFIX: &str = "GITHUB_";

/// Register all GitHub resource kinds
///
/// Called during provider initialization:
///
/// ```rust
/// use forgeprov_core::ResourceRegistry;
///
/// let registry = ResourceRegistry::with_builtin_stores();
/// forgeprov_github::register(&registry);
/// assert!(registry.has_kind("github_membership"));
/// ```
pub fn register(registry: &ResourceRegistry) {
    registry.register_kind(Arc::new(UserSshKey::new()));
    registry.register_kind(Arc::new(Membership::new()));
    registry.register_kind(Arc::new(ActionsVariable::new()));
    registry.register_kind(Arc::new(RepositoryEnvironment::new()));
}

/// Join already validated import parts into a remote identifier
fn join_id<S: AsRef<str>>(parts: impl IntoIterator<Item = S>) -> RemoteId {
    let mut id = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            id.push(IMPORT_ID_SEPARATOR);
        }
        id.push_str(part.as_ref());
    }
    RemoteId::new(id)
}
