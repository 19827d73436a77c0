// # Resource Kind Trait
//
// Static, per-kind knowledge: the attribute schema, cross-field rules,
// derived attributes, and how import identifiers are laid out.
//
// A resource kind does no I/O. Everything that talks to the service lives
// behind `RemoteClient`, and everything stateful lives in the reconciler.

use crate::normalize::{normalize_object, prune_object};
use crate::schema::Schema;
use crate::traits::RemoteId;
use crate::validate::Violations;
use crate::value::Object;

/// Trait for resource kinds
///
/// # Canonical form
///
/// [`ResourceKind::canonicalize`] is the single function that turns attributes
/// reported by the service into stored attributes. Create, update, refresh and
/// import all go through it, so an imported instance and a created-then-read
/// instance end up with equal state.
pub trait ResourceKind: Send + Sync {
    /// Type name used in resource addresses (e.g. `github_user_ssh_key`)
    fn type_name(&self) -> &'static str;

    /// Attribute schema
    fn schema(&self) -> &Schema;

    /// Cross-field checks that do not fit a single attribute's validators
    ///
    /// Called after the schema checks, with the raw configuration. Must skip
    /// null and unknown values.
    fn validate(&self, _config: &Object, _out: &mut Violations) {}

    /// Fill in attributes derived from canonical content (e.g. fingerprints)
    ///
    /// Must be deterministic and recompute from scratch on every call.
    fn derive(&self, _attributes: &mut Object) {}

    /// Names of the parts of an import identifier, in order
    ///
    /// A single part means the raw identifier is used as is; several parts
    /// are separated by [`IMPORT_ID_SEPARATOR`](crate::import::IMPORT_ID_SEPARATOR).
    fn import_id_parts(&self) -> &'static [&'static str] {
        &["id"]
    }

    /// Kind-specific checks on already split identifier parts
    ///
    /// # Returns
    ///
    /// - `Ok(())`: parts are usable
    /// - `Err(reason)`: human-readable reason the identifier is malformed
    fn check_import_parts(&self, _parts: &[&str]) -> Result<(), String> {
        Ok(())
    }

    /// Remote identifier for the given import parts
    fn remote_id_from_parts(&self, parts: &[&str]) -> RemoteId {
        RemoteId::new(parts.join(":"))
    }

    /// Attributes known from the import identifier alone
    ///
    /// By default every part whose name is a schema attribute is seeded.
    /// Values the service reports take precedence over seeded ones.
    fn seed_from_import(&self, parts: &[&str]) -> Object {
        self.import_id_parts()
            .iter()
            .zip(parts)
            .filter(|(name, _)| self.schema().contains(name))
            .map(|(name, part)| (name.to_string(), (*part).into()))
            .collect()
    }

    /// Turn service-reported attributes into stored attributes
    ///
    /// Normalizes every attribute, drops attributes outside the schema and
    /// nulls at every nesting level, then recomputes derived attributes.
    fn canonicalize(&self, attributes: Object) -> Object {
        let schema = self.schema();
        let mut canonical = prune_object(schema, normalize_object(schema, attributes));
        self.derive(&mut canonical);
        canonical.without_nulls()
    }
}
