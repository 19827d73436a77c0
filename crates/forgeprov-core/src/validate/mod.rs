//! Validator set
//!
//! Validators are pure predicates over one attribute value. They never mutate
//! their input and report into a shared [`Violations`] collector, so every
//! problem in a configuration is reported together instead of stopping at the
//! first one.
//!
//! Null and unknown values are never handed to a validator: a value that is
//! not yet resolvable is skipped, not failed.
//!
//! - [`NamingValidator`]: identifier pattern plus a reserved prefix
//! - [`ConflictsWith`]: at most one attribute of a sibling group may be set
//! - [`OneOf`]: enum membership
//! - [`NotEmpty`]: non-blank strings
//!
//! [`validate_object`] walks a configuration against its [`Schema`] and runs
//! the presence and type checks before the attached validators.

mod conflict;
mod naming;
mod one_of;

pub use conflict::ConflictsWith;
pub use naming::{NAME_PATTERN, NamingValidator};
pub use one_of::{NotEmpty, OneOf};

use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{AttrType, Presence, Schema};
use crate::value::{AttrPath, AttrValue, Object, Value};

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Attribute the violation is reported on
    pub path: AttrPath,
    /// Human-readable message
    pub message: String,
    /// The other attribute involved, for cross-field violations
    pub related: Option<AttrPath>,
}

impl Violation {
    /// Create a violation on a single attribute
    pub fn new(path: AttrPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            related: None,
        }
    }

    /// Create a violation involving two attributes
    pub fn between(path: AttrPath, related: AttrPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            related: Some(related),
        }
    }

    fn mirrors(&self, other: &Violation) -> bool {
        self.related.as_ref() == Some(&other.path) && other.related.as_ref() == Some(&self.path)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Collector for violations across a whole configuration
///
/// A cross-field violation between `a` and `b` is kept once even when both
/// attributes declare the relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn push(&mut self, violation: Violation) {
        if self
            .0
            .iter()
            .any(|existing| existing == &violation || existing.mirrors(&violation))
        {
            return;
        }
        self.0.push(violation);
    }

    /// Record every violation from another collector
    pub fn extend(&mut self, other: Violations) {
        for violation in other.0 {
            self.push(violation);
        }
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of violations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the violations in report order
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Violations reported on one attribute
    pub fn at<'a>(&'a self, path: &'a AttrPath) -> impl Iterator<Item = &'a Violation> + 'a {
        self.0.iter().filter(move |v| &v.path == path)
    }

    /// `Ok(())` when empty, [`Error::ValidationFailed`] otherwise
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(self))
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Where a value sits inside its configuration
///
/// `parent` is the object that directly contains the attribute, so sibling
/// lookups work the same at the root and inside nested blocks.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Path of the attribute being validated
    pub path: &'a AttrPath,
    /// Object containing the attribute
    pub parent: &'a Object,
}

impl<'a> ValidationContext<'a> {
    /// Create a context
    pub fn new(path: &'a AttrPath, parent: &'a Object) -> Self {
        Self { path, parent }
    }

    /// Value of a sibling attribute
    pub fn sibling(&self, name: &str) -> &'a AttrValue {
        self.parent.get(name)
    }

    /// Path of a sibling attribute
    pub fn sibling_path(&self, name: &str) -> AttrPath {
        self.path.sibling(name)
    }
}

/// A pure predicate over one known attribute value
///
/// # Thread Safety
///
/// Validators are shared across concurrently reconciled instances and must be
/// stateless.
pub trait Validator: Send + Sync {
    /// Short description, used in diagnostics
    fn description(&self) -> String;

    /// Check a value, reporting any problems into `out`
    ///
    /// # Parameters
    ///
    /// - `value`: the known value; null and unknown values are never passed
    /// - `ctx`: attribute path and the parent object for sibling lookups
    /// - `out`: collector to report violations into
    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations);
}

/// Validate a configuration object against a schema
///
/// Runs, per attribute: required/computed presence checks, the type check,
/// every attached validator, and recursion into nested blocks. Attributes not
/// declared by the schema are reported as unsupported.
pub fn validate_object(schema: &Schema, object: &Object) -> Violations {
    let mut out = Violations::new();
    walk(schema, object, &AttrPath::root(), &mut out);
    out
}

fn walk(schema: &Schema, object: &Object, base: &AttrPath, out: &mut Violations) {
    for (name, attribute) in schema.iter() {
        let path = base.child(name);
        let value = match object.get(name) {
            AttrValue::Null => {
                if attribute.presence() == Presence::Required {
                    out.push(Violation::new(path, "required attribute is not set"));
                }
                continue;
            }
            AttrValue::Unknown => continue,
            AttrValue::Known(value) => value,
        };

        if attribute.is_computed() {
            out.push(Violation::new(
                path,
                "attribute is computed by the service and cannot be set",
            ));
            continue;
        }

        if !attribute.attr_type().matches(value) {
            out.push(Violation::new(
                path,
                format!("expected {}, got {value}", attribute.attr_type()),
            ));
            continue;
        }

        let ctx = ValidationContext::new(&path, object);
        for validator in attribute.validators() {
            validator.validate(value, &ctx, out);
        }

        if let (AttrType::Block, Some(block), Value::Object(inner)) =
            (attribute.attr_type(), attribute.block(), value)
        {
            walk(block, inner, &path, out);
        }
    }

    for (name, value) in object.iter() {
        if !value.is_null() && !schema.contains(name) {
            out.push(Violation::new(base.child(name), "unsupported attribute"));
        }
    }
}

/// Report every attribute that is still unknown
///
/// Unknown values are skipped during validation, but they cannot be sent to
/// the remote service.
pub fn require_known(object: &Object) -> Violations {
    let mut out = Violations::new();
    collect_unknown(object, &AttrPath::root(), &mut out);
    out
}

fn collect_unknown(object: &Object, base: &AttrPath, out: &mut Violations) {
    for (name, value) in object.iter() {
        let path = base.child(name);
        match value {
            AttrValue::Unknown => out.push(Violation::new(path, "value is not known at apply time")),
            AttrValue::Known(Value::Object(inner)) => collect_unknown(inner, &path, out),
            AttrValue::Known(Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    match item {
                        AttrValue::Unknown => out.push(Violation::new(
                            path.index(i),
                            "value is not known at apply time",
                        )),
                        AttrValue::Known(Value::Object(inner)) => {
                            collect_unknown(inner, &path.index(i), out)
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}
