//! `github_membership`: a user's membership in an organization
//!
//! Organization and login identify the membership and are compared
//! case-insensitively, the way GitHub treats logins. The role can be changed
//! in place; when it is not configured, GitHub's default (`member`) is kept.

use forgeprov_core::normalize::CaseFold;
use forgeprov_core::schema::{Attribute, Schema};
use forgeprov_core::validate::{NotEmpty, OneOf};
use forgeprov_core::{RemoteId, ResourceKind};

use crate::join_id;

/// Type name of the kind
pub const TYPE_NAME: &str = "github_membership";

/// Roles a member can hold
pub const ROLES: &[&str] = &["member", "admin"];

/// Organization membership resource kind
pub struct Membership {
    schema: Schema,
}

impl Membership {
    pub fn new() -> Self {
        Self {
            schema: Schema::new()
                .with_attribute(
                    "organization",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NotEmpty)
                        .with_normalizer(CaseFold::Lower),
                )
                .with_attribute(
                    "username",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NotEmpty)
                        .with_normalizer(CaseFold::Lower),
                )
                .with_attribute(
                    "role",
                    Attribute::optional_computed_string()
                        .with_validator(OneOf::new(ROLES.iter().copied())),
                )
                .with_attribute("etag", Attribute::computed_string()),
        }
    }
}

impl Default for Membership {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for Membership {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn import_id_parts(&self) -> &'static [&'static str] {
        &["organization", "username"]
    }

    fn remote_id_from_parts(&self, parts: &[&str]) -> RemoteId {
        join_id(parts.iter().map(|p| p.trim().to_lowercase()))
    }
}
