//! Per-kind attribute schema
//!
//! A [`Schema`] is static metadata declared once per resource kind. Besides the
//! attribute types it records, per attribute:
//!
//! - whether the user must, may, or cannot set it ([`Presence`])
//! - whether the remote service can change it in place ([`Mutability`])
//! - the validators and the normalizer that apply to it
//!
//! The diff step consults [`Mutability`] once per computation to decide between
//! an in-place update and a replace.
//!
//! ```rust
//! use forgeprov_core::schema::{Attribute, Schema};
//!
//! let schema = Schema::new()
//!     .with_attribute("title", Attribute::required_string().force_replace())
//!     .with_attribute("fingerprint", Attribute::computed_string());
//!
//! assert!(schema.attribute("title").unwrap().is_force_replace());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::normalize::Normalizer;
use crate::validate::Validator;
use crate::value::Value;

/// Who provides an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be set in the configuration
    Required,
    /// May be set in the configuration
    Optional,
    /// May be set; when left null the service picks the value
    OptionalComputed,
    /// Set by the service only
    Computed,
}

/// Whether the remote service can change an attribute in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    /// Updatable through the remote update call
    #[default]
    InPlace,
    /// Changing it requires destroying and recreating the entity
    ForceReplace,
}

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// String (enums are strings restricted by a validator)
    String,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Ordered sequence
    List,
    /// Nested block described by its own schema
    Block,
}

impl AttrType {
    /// Whether a value has this type
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::Int, Value::Int(_))
                | (Self::List, Value::List(_))
                | (Self::Block, Value::Object(_))
        )
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::List => "list",
            Self::Block => "block",
        };
        f.write_str(name)
    }
}

/// Schema entry for one attribute
#[derive(Clone)]
pub struct Attribute {
    attr_type: AttrType,
    presence: Presence,
    mutability: Mutability,
    sensitive: bool,
    validators: Vec<Arc<dyn Validator>>,
    normalizer: Option<Arc<dyn Normalizer>>,
    block: Option<Schema>,
}

impl Attribute {
    fn new(attr_type: AttrType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
            mutability: Mutability::InPlace,
            sensitive: false,
            validators: Vec::new(),
            normalizer: None,
            block: None,
        }
    }

    /// A string the user must set
    pub fn required_string() -> Self {
        Self::new(AttrType::String, Presence::Required)
    }

    /// A string the user may set
    pub fn optional_string() -> Self {
        Self::new(AttrType::String, Presence::Optional)
    }

    /// A string the service chooses when the user leaves it null
    pub fn optional_computed_string() -> Self {
        Self::new(AttrType::String, Presence::OptionalComputed)
    }

    /// A string only the service sets
    pub fn computed_string() -> Self {
        Self::new(AttrType::String, Presence::Computed)
    }

    /// A boolean the user may set
    pub fn optional_bool() -> Self {
        Self::new(AttrType::Bool, Presence::Optional)
    }

    /// A boolean the service chooses when the user leaves it null
    pub fn optional_computed_bool() -> Self {
        Self::new(AttrType::Bool, Presence::OptionalComputed)
    }

    /// An integer the user may set
    pub fn optional_int() -> Self {
        Self::new(AttrType::Int, Presence::Optional)
    }

    /// A list the user may set
    pub fn optional_list() -> Self {
        Self::new(AttrType::List, Presence::Optional)
    }

    /// An optional nested block
    pub fn optional_block(schema: Schema) -> Self {
        let mut attr = Self::new(AttrType::Block, Presence::Optional);
        attr.block = Some(schema);
        attr
    }

    /// Mark the attribute as requiring replacement when it changes
    pub fn force_replace(mut self) -> Self {
        self.mutability = Mutability::ForceReplace;
        self
    }

    /// Mark the attribute as sensitive (never logged)
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Attach a validator
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Attach the normalizer applied before comparison and after fetch
    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Some(Arc::new(normalizer));
        self
    }

    /// Declared type
    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    /// Who provides the value
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// In-place or force-replace
    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    /// Whether changing it forces a replace
    pub fn is_force_replace(&self) -> bool {
        self.mutability == Mutability::ForceReplace
    }

    /// Whether the value must stay out of logs
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Whether only the service sets it
    pub fn is_computed(&self) -> bool {
        self.presence == Presence::Computed
    }

    /// Whether the user may set it
    pub fn is_configurable(&self) -> bool {
        self.presence != Presence::Computed
    }

    /// Attached validators
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Attached normalizer
    pub fn normalizer(&self) -> Option<&dyn Normalizer> {
        self.normalizer.as_deref()
    }

    /// Nested block schema
    pub fn block(&self) -> Option<&Schema> {
        self.block.as_ref()
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("attr_type", &self.attr_type)
            .field("presence", &self.presence)
            .field("mutability", &self.mutability)
            .field("sensitive", &self.sensitive)
            .field("validators", &self.validators.len())
            .field("normalizer", &self.normalizer.is_some())
            .field("block", &self.block)
            .finish()
    }
}

/// Attribute schema of a resource kind or nested block
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Whether the schema declares this attribute
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// All attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutability of an attribute; undeclared attributes are treated as in-place
    pub fn mutability(&self, name: &str) -> Mutability {
        self.attribute(name)
            .map(Attribute::mutability)
            .unwrap_or_default()
    }

    /// Whether the attribute is declared sensitive
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(Attribute::is_sensitive)
    }
}
