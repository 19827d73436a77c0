//! `github_actions_variable`: a repository-level GitHub Actions variable
//!
//! GitHub stores variable names upper-cased and reserves the `GITHUB_`
//! prefix. The value is updated in place; renaming or moving the variable
//! replaces it.

use forgeprov_core::normalize::{CaseFold, TrimWhitespace};
use forgeprov_core::schema::{Attribute, Schema};
use forgeprov_core::validate::{NamingValidator, NotEmpty, Violation, Violations};
use forgeprov_core::{AttrPath, Object, RemoteId, ResourceKind};

use crate::{RESERVED_NAME_PREFIX, join_id};

/// Type name of the kind
pub const TYPE_NAME: &str = "github_actions_variable";

/// Largest value GitHub accepts for a single variable
pub const MAX_VALUE_BYTES: usize = 48 * 1024;

/// Actions variable resource kind
pub struct ActionsVariable {
    schema: Schema,
}

impl ActionsVariable {
    pub fn new() -> Self {
        Self {
            schema: Schema::new()
                .with_attribute(
                    "repository",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NotEmpty)
                        .with_normalizer(TrimWhitespace),
                )
                .with_attribute(
                    "variable_name",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NamingValidator::new(RESERVED_NAME_PREFIX))
                        .with_normalizer(CaseFold::Upper),
                )
                .with_attribute("value", Attribute::required_string())
                .with_attribute("created_at", Attribute::computed_string())
                .with_attribute("updated_at", Attribute::computed_string()),
        }
    }
}

impl Default for ActionsVariable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for ActionsVariable {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, config: &Object, out: &mut Violations) {
        if let Some(value) = config.get_str("value") {
            if value.len() > MAX_VALUE_BYTES {
                out.push(Violation::new(
                    AttrPath::attr("value"),
                    format!("must not exceed {MAX_VALUE_BYTES} bytes"),
                ));
            }
        }
    }

    fn import_id_parts(&self) -> &'static [&'static str] {
        &["repository", "variable_name"]
    }

    fn check_import_parts(&self, parts: &[&str]) -> Result<(), String> {
        let Some(name) = parts.get(1) else {
            return Ok(());
        };
        let problems = NamingValidator::new(RESERVED_NAME_PREFIX).check(name);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(format!("variable name {}", problems.join(" and ")))
        }
    }

    fn remote_id_from_parts(&self, parts: &[&str]) -> RemoteId {
        match parts {
            [repository, name] => {
                join_id([repository.trim().to_string(), name.trim().to_uppercase()])
            }
            _ => join_id(parts),
        }
    }
}
