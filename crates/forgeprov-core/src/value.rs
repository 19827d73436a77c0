//! Attribute values
//!
//! Every configuration attribute is tri-state: it may be explicitly null, not
//! yet known (computed upstream and resolved later), or known. Validation and
//! diffing treat the three differently, so they are kept apart as
//! [`AttrValue`] rather than collapsed into an `Option`.
//!
//! ## Persistence
//!
//! [`Value`] serializes as plain JSON (`true`, `42`, `"text"`, arrays and
//! objects). [`Object`] drops null entries when serialized, and an
//! [`AttrValue::Unknown`] refuses to serialize at all: unknown values must be
//! resolved before anything is persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A known attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// String (also used for enum-like attributes)
    String(String),
    /// Ordered sequence
    List(Vec<AttrValue>),
    /// Nested block
    Object(Object),
}

impl Value {
    /// The string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean payload, if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The nested block, if this is an object
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Whether an unknown value is nested anywhere inside
    pub fn contains_unknown(&self) -> bool {
        match self {
            Self::List(items) => items.iter().any(AttrValue::contains_unknown),
            Self::Object(object) => object.contains_unknown(),
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => write!(f, "<list of {}>", items.len()),
            Self::Object(object) => write!(f, "<{} with {} attributes>", self.type_name(), object.len()),
        }
    }
}

/// Tri-state attribute value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AttrValue {
    /// Explicitly unset
    #[default]
    Null,
    /// Not yet resolvable (computed upstream, known after apply)
    Unknown,
    /// A concrete value
    Known(Value),
}

impl AttrValue {
    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value is unknown
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether the value is set to a concrete value
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The concrete value, if known
    pub fn known(&self) -> Option<&Value> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Shortcut for a known string value
    pub fn as_str(&self) -> Option<&str> {
        self.known().and_then(Value::as_str)
    }

    /// Whether this value is, or contains, an unknown value
    pub fn contains_unknown(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Unknown => true,
            Self::Known(v) => v.contains_unknown(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Unknown => write!(f, "(known after apply)"),
            Self::Known(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Known(v) => v.serialize(serializer),
            Self::Unknown => Err(serde::ser::Error::custom(
                "unknown values cannot be persisted",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for AttrValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<Value>::deserialize(deserializer)?.map_or(Self::Null, Self::Known))
    }
}

macro_rules! known_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }

            impl From<$ty> for AttrValue {
                fn from(v: $ty) -> Self {
                    AttrValue::Known(Value::$variant(v.into()))
                }
            }
        )*
    };
}

known_from! {
    bool => Bool,
    i64 => Int,
    &str => String,
    String => String,
    Object => Object,
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        AttrValue::Known(v)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttrValue::Null, Into::into)
    }
}

static NULL: AttrValue = AttrValue::Null;

/// An ordered mapping from attribute name to value
///
/// Used for configurations, nested blocks, remote payloads and stored state.
/// A missing entry and an explicit null entry compare equal, and nulls are
/// dropped when the object is serialized. Explicit nulls are still kept in
/// memory so an update payload can ask the remote to clear an attribute.
#[derive(Debug, Clone, Default)]
pub struct Object(BTreeMap<String, AttrValue>);

impl Object {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace an attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Get an attribute; missing attributes read as null
    pub fn get(&self, name: &str) -> &AttrValue {
        self.0.get(name).unwrap_or(&NULL)
    }

    /// Shortcut for a known string attribute
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    /// Remove an attribute, returning its previous value
    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        self.0.remove(name)
    }

    /// Number of non-null attributes
    pub fn len(&self) -> usize {
        self.present().count()
    }

    /// Whether no attribute is set
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all entries, including explicit nulls
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attribute names, including explicit nulls
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether an unknown value is nested anywhere inside
    pub fn contains_unknown(&self) -> bool {
        self.0.values().any(AttrValue::contains_unknown)
    }

    /// Overlay `other` on top of this object; `other` wins on conflicts
    pub fn merge(&mut self, other: Object) {
        self.0.extend(other.0);
    }

    /// Drop explicit null entries
    pub fn without_nulls(mut self) -> Self {
        self.0.retain(|_, v| !v.is_null());
        self
    }

    fn present(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter().filter(|(_, v)| !v.is_null())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.present().eq(other.present())
    }
}

impl Eq for Object {}

impl FromIterator<(String, AttrValue)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Object {
    type Item = (String, AttrValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.present())
    }
}

impl<'de> Deserialize<'de> for Object {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<String, AttrValue>::deserialize(deserializer)?;
        Ok(Self(entries).without_nulls())
    }
}

/// One step in an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Named attribute
    Attr(String),
    /// Position in a list
    Index(usize),
}

/// Location of an attribute inside a configuration, e.g. `policy.protected_branches`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttrPath(Vec<PathStep>);

impl AttrPath {
    /// The configuration root
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to a top-level attribute
    pub fn attr(name: impl Into<String>) -> Self {
        Self::root().child(name)
    }

    /// Path to a named child of this path
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Attr(name.into()));
        Self(steps)
    }

    /// Path to a list element below this path
    pub fn index(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Index(index));
        Self(steps)
    }

    /// The enclosing path, or `None` at the root
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// Path to a sibling attribute (same parent)
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        self.parent().unwrap_or_default().child(name)
    }

    /// The attribute name at the end of this path
    pub fn name(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathStep::Attr(name)) => Some(name),
            _ => None,
        }
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The individual steps
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attr(name) if i == 0 => write!(f, "{name}")?,
                PathStep::Attr(name) => write!(f, ".{name}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
