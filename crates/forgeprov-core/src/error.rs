//! Error types for the reconciliation core
//!
//! This module defines all error types used throughout the crate.
//!
//! The taxonomy mirrors how a failure should be handled by the caller:
//! - [`Error::ValidationFailed`]: local, pre-flight, never touched the remote
//! - [`Error::RemoteRejected`]: the service refused the operation, not retried
//! - [`Error::RemoteNotFound`]: the remote entity does not exist
//! - [`Error::RemoteTransient`]: propagated for the caller's own retry policy
//! - [`Error::MalformedIdentifier`]: an import identifier could not be parsed

use std::fmt;

use thiserror::Error;

use crate::traits::{RemoteError, RemoteId};
use crate::validate::Violations;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies which resource instance an error belongs to
///
/// Reconciler errors always carry the instance address and, once the remote
/// entity exists, its identifier so failures can be correlated across
/// concurrently reconciled instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Resource address (e.g. `github_user_ssh_key.laptop`)
    pub address: String,
    /// Remote identifier, if the entity was ever created
    pub id: Option<RemoteId>,
}

impl Target {
    /// Create a target for an instance that has no remote entity yet
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            id: None,
        }
    }

    /// Attach the remote identifier
    pub fn with_id(mut self, id: RemoteId) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} (id {})", self.address, id),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Core error type for the reconciliation core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed one or more validators
    #[error("Validation failed: {0}")]
    ValidationFailed(Violations),

    /// The remote service refused the operation
    #[error("Remote rejected {target}: {message}")]
    RemoteRejected {
        /// Instance the operation was for
        target: Target,
        /// Message reported by the remote service, verbatim
        message: String,
    },

    /// The remote entity does not exist
    #[error("Remote entity not found for {target}: {message}")]
    RemoteNotFound {
        /// Instance the operation was for
        target: Target,
        /// Message reported by the remote service
        message: String,
    },

    /// The remote service failed in a way that may succeed on retry
    #[error("Transient remote failure for {target}: {message}")]
    RemoteTransient {
        /// Instance the operation was for
        target: Target,
        /// Message reported by the remote service
        message: String,
    },

    /// An import identifier did not have the expected layout
    #[error("Malformed identifier {id:?}: expected {expected}")]
    MalformedIdentifier {
        /// The identifier as supplied by the caller
        id: String,
        /// Human-readable description of the expected layout
        expected: String,
    },

    /// The caller cancelled the operation before the remote confirmed it
    #[error("Operation cancelled for {0}")]
    Cancelled(Target),

    /// No resource kind registered under this name
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a malformed identifier error
    pub fn malformed_identifier(id: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            id: id.into(),
            expected: expected.into(),
        }
    }

    /// Map a remote client failure onto the error taxonomy
    ///
    /// Conflicts are reported as rejections; the service refused the request
    /// either way and the message is kept verbatim.
    pub fn remote(err: RemoteError, target: Target) -> Self {
        match err {
            RemoteError::NotFound(message) => Self::RemoteNotFound { target, message },
            RemoteError::Conflict(message) | RemoteError::Rejected(message) => {
                Self::RemoteRejected { target, message }
            }
            RemoteError::Transient(message) => Self::RemoteTransient { target, message },
        }
    }

    /// The instance this error refers to, if any
    pub fn target(&self) -> Option<&Target> {
        match self {
            Self::RemoteRejected { target, .. }
            | Self::RemoteNotFound { target, .. }
            | Self::RemoteTransient { target, .. }
            | Self::Cancelled(target) => Some(target),
            _ => None,
        }
    }

    /// Fill in the target's remote id when it has none
    ///
    /// Used when the instance lost its id mid-operation, so the error still
    /// names the entity it was working on.
    pub fn with_target_id(mut self, id: RemoteId) -> Self {
        if let Self::RemoteRejected { target, .. }
        | Self::RemoteNotFound { target, .. }
        | Self::RemoteTransient { target, .. }
        | Self::Cancelled(target) = &mut self
        {
            if target.id.is_none() {
                target.id = Some(id);
            }
        }
        self
    }

    /// Whether the caller may reasonably retry the operation
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteTransient { .. })
    }

    /// Whether this error means the remote entity is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RemoteNotFound { .. })
    }

    /// The collected violations, for validation failures
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::ValidationFailed(violations) => Some(violations),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display_includes_id_when_known() {
        let target = Target::new("github_membership.alice");
        assert_eq!(target.to_string(), "github_membership.alice");

        let target = target.with_id(RemoteId::new("acme:alice"));
        assert_eq!(target.to_string(), "github_membership.alice (id acme:alice)");
    }

    #[test]
    fn test_error_exposes_target() {
        let err = Error::RemoteRejected {
            target: Target::new("github_user_ssh_key.laptop").with_id(RemoteId::new("42")),
            message: "key is already in use".to_string(),
        };

        assert_eq!(
            err.target().and_then(|t| t.id.as_ref()).map(RemoteId::as_str),
            Some("42")
        );
        assert!(!err.is_transient());
        assert!(err.to_string().contains("key is already in use"));
    }

    #[test]
    fn test_with_target_id_keeps_a_known_id() {
        let err = Error::remote(
            RemoteError::Transient("timeout".to_string()),
            Target::new("github_user_ssh_key.laptop"),
        )
        .with_target_id(RemoteId::new("41"));
        assert_eq!(err.target().and_then(|t| t.id.clone()), Some(RemoteId::new("41")));

        let err = err.with_target_id(RemoteId::new("99"));
        assert_eq!(err.target().and_then(|t| t.id.clone()), Some(RemoteId::new("41")));

        let err = Error::config("bad").with_target_id(RemoteId::new("41"));
        assert!(err.target().is_none());
    }

    #[test]
    fn test_remote_error_mapping() {
        let target = Target::new("github_membership.alice");

        let err = Error::remote(RemoteError::Conflict("already a member".into()), target.clone());
        assert!(matches!(err, Error::RemoteRejected { ref message, .. } if message == "already a member"));

        let err = Error::remote(RemoteError::NotFound("404".into()), target.clone());
        assert!(err.is_not_found());

        let err = Error::remote(RemoteError::Transient("502".into()), target);
        assert!(err.is_transient());
    }

    #[test]
    fn test_malformed_identifier_message() {
        let err = Error::malformed_identifier("acme", "<organization>:<username>");
        assert_eq!(
            err.to_string(),
            "Malformed identifier \"acme\": expected <organization>:<username>"
        );
    }
}
