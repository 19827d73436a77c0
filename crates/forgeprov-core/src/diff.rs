//! Attribute-level diff between desired configuration and stored state
//!
//! Both sides are normalized before comparison. Computed attributes never
//! appear in a diff, and an optional-computed attribute left null in the
//! configuration keeps whatever the service chose.

use std::fmt;

use crate::normalize::normalize_object;
use crate::schema::{Attribute, Mutability, Presence, Schema};
use crate::value::{AttrValue, Object, Value};

/// One attribute whose desired value differs from the stored one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    /// Attribute name
    pub name: String,
    /// Stored value
    pub before: AttrValue,
    /// Desired value (normalized)
    pub after: AttrValue,
    /// Whether the service can apply the change in place
    pub mutability: Mutability,
    /// Whether values must be redacted when displayed
    pub sensitive: bool,
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.mutability {
            Mutability::InPlace => "~",
            Mutability::ForceReplace => "-/+",
        };
        if self.sensitive {
            write!(f, "{marker} {}: (sensitive value)", self.name)
        } else {
            write!(f, "{marker} {}: {} -> {}", self.name, self.before, self.after)
        }
    }
}

/// The set of attributes that differ after normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    changes: Vec<AttributeChange>,
}

impl Diff {
    /// Compare `desired` against `stored` using the mutability declared in `schema`
    ///
    /// Nested blocks are compared attribute by attribute against the block's
    /// schema. A changed block forces replacement when the block itself or
    /// any changed attribute inside it does.
    pub fn compute(schema: &Schema, desired: &Object, stored: &Object) -> Self {
        let desired = normalize_object(schema, desired.clone());
        let stored = normalize_object(schema, stored.clone());

        let changes = compared(schema, &desired)
            .filter_map(|(name, attribute)| {
                let after = desired.get(name);
                let before = stored.get(name);
                attribute_change(attribute, after, before).map(|mutability| AttributeChange {
                    name: name.to_string(),
                    before: before.clone(),
                    after: after.clone(),
                    mutability,
                    sensitive: attribute.is_sensitive(),
                })
            })
            .collect();

        Self { changes }
    }

    /// Whether nothing differs
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether any changed attribute cannot be updated in place
    pub fn requires_replace(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.mutability == Mutability::ForceReplace)
    }

    /// The individual changes, in attribute name order
    pub fn changes(&self) -> &[AttributeChange] {
        &self.changes
    }

    /// Names of the changed attributes
    pub fn names(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.name.clone()).collect()
    }

    /// Payload for an in-place update
    ///
    /// Contains only the changed attributes. Attributes cleared in the
    /// configuration are included as explicit nulls.
    pub fn changed_fields(&self) -> Object {
        self.changes
            .iter()
            .map(|c| (c.name.clone(), c.after.clone()))
            .collect()
    }
}

/// Attributes of `schema` that take part in a comparison with `desired`
///
/// Computed attributes never do, and an optional-computed attribute only
/// when the configuration sets it.
fn compared<'a>(
    schema: &'a Schema,
    desired: &'a Object,
) -> impl Iterator<Item = (&'a str, &'a Attribute)> + 'a {
    schema.iter().filter(move |(name, attribute)| {
        !attribute.is_computed()
            && !(attribute.presence() == Presence::OptionalComputed
                && desired.get(name).is_null())
    })
}

/// How an attribute must change to go from `before` to `after`, if at all
fn attribute_change(attribute: &Attribute, after: &AttrValue, before: &AttrValue) -> Option<Mutability> {
    match (attribute.block(), after, before) {
        (
            Some(block),
            AttrValue::Known(Value::Object(after)),
            AttrValue::Known(Value::Object(before)),
        ) => {
            let nested = compared(block, after)
                .filter_map(|(name, inner)| attribute_change(inner, after.get(name), before.get(name)))
                .reduce(strongest)?;
            Some(strongest(attribute.mutability(), nested))
        }
        _ => (after != before).then(|| attribute.mutability()),
    }
}

fn strongest(a: Mutability, b: Mutability) -> Mutability {
    if a == Mutability::ForceReplace || b == Mutability::ForceReplace {
        Mutability::ForceReplace
    } else {
        Mutability::InPlace
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no changes");
        }
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{change}")?;
        }
        Ok(())
    }
}
