//! Identifier naming rules
//!
//! Names must look like identifiers and must not use a prefix the remote
//! service reserves for itself. The two checks are independent and both are
//! always reported.

use std::sync::LazyLock;

use regex::Regex;

use super::{ValidationContext, Validator, Violation, Violations};
use crate::value::Value;

/// Accepted identifier shape
pub const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("NAME_PATTERN is a valid regex pattern"));

/// Identifier validator with a reserved, case-insensitive prefix
#[derive(Debug, Clone)]
pub struct NamingValidator {
    reserved_prefix: String,
}

impl NamingValidator {
    /// Create a validator that rejects names starting with `reserved_prefix`
    pub fn new(reserved_prefix: impl Into<String>) -> Self {
        Self {
            reserved_prefix: reserved_prefix.into(),
        }
    }

    /// Problems with `name`, in check order (empty when valid)
    pub fn check(&self, name: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if !NAME_REGEX.is_match(name) {
            problems.push(
                "must start with a letter or underscore and contain only letters, digits and underscores"
                    .to_string(),
            );
        }

        if self.has_reserved_prefix(name) {
            problems.push(format!(
                "must not start with the reserved prefix {:?}",
                self.reserved_prefix
            ));
        }

        problems
    }

    fn has_reserved_prefix(&self, name: &str) -> bool {
        let prefix = self.reserved_prefix.as_str();
        !prefix.is_empty()
            && name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }
}

impl Validator for NamingValidator {
    fn description(&self) -> String {
        format!(
            "matches {NAME_PATTERN} and does not start with {:?}",
            self.reserved_prefix
        )
    }

    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations) {
        let Some(name) = value.as_str() else {
            return;
        };
        for problem in self.check(name) {
            out.push(Violation::new(ctx.path.clone(), problem));
        }
    }
}
