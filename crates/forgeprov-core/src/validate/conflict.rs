//! Mutually exclusive sibling attributes

use super::{ValidationContext, Validator, Violation, Violations};
use crate::value::Value;

/// Rejects the attribute when any of the named siblings is also set
///
/// Siblings are looked up in the object that contains the attribute, so the
/// same validator works at the root and inside nested blocks. Only known
/// siblings count as set.
#[derive(Debug, Clone)]
pub struct ConflictsWith {
    siblings: Vec<String>,
}

impl ConflictsWith {
    /// Create a validator for the given sibling attribute names
    pub fn new<I, S>(siblings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            siblings: siblings.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for ConflictsWith {
    fn description(&self) -> String {
        format!("conflicts with {}", self.siblings.join(", "))
    }

    fn validate(&self, _value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations) {
        for sibling in &self.siblings {
            if !ctx.sibling(sibling).is_known() {
                continue;
            }
            let related = ctx.sibling_path(sibling);
            let message = format!("conflicts with {related}; only one of them may be set");
            out.push(Violation::between(ctx.path.clone(), related, message));
        }
    }
}
