//! Simple value constraints

use super::{ValidationContext, Validator, Violation, Violations};
use crate::value::Value;

/// Restricts a string attribute to a fixed set of values
#[derive(Debug, Clone)]
pub struct OneOf {
    allowed: Vec<String>,
}

impl OneOf {
    /// Create a validator accepting exactly these values
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for OneOf {
    fn description(&self) -> String {
        format!("one of {}", self.allowed.join(", "))
    }

    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations) {
        let Some(s) = value.as_str() else {
            return;
        };
        if !self.allowed.iter().any(|a| a == s) {
            out.push(Violation::new(
                ctx.path.clone(),
                format!("{s:?} is not one of: {}", self.allowed.join(", ")),
            ));
        }
    }
}

/// Rejects blank strings
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEmpty;

impl Validator for NotEmpty {
    fn description(&self) -> String {
        "not empty".to_string()
    }

    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations) {
        if value.as_str().is_some_and(|s| s.trim().is_empty()) {
            out.push(Violation::new(ctx.path.clone(), "must not be empty"));
        }
    }
}
