//! Attribute normalizers
//!
//! A normalizer canonicalizes a value so that a freshly fetched remote entity
//! and a previously stored state compare equal even when the service
//! reformats things (line endings, trailing whitespace, key comments, case).
//!
//! Every normalizer must be pure and idempotent:
//! `normalize(normalize(x)) == normalize(x)`.
//!
//! Derived attributes such as key fingerprints are not normalizers; they are
//! recomputed from the canonical content by
//! [`ResourceKind::derive`](crate::traits::ResourceKind::derive).

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use sha2::{Digest, Sha256};

use crate::schema::Schema;
use crate::value::{AttrValue, Object, Value};

/// Canonicalizes one attribute value
pub trait Normalizer: Send + Sync {
    /// Return the canonical form of `value`
    ///
    /// Values of a type the normalizer does not handle are returned unchanged.
    fn normalize(&self, value: Value) -> Value;
}

fn map_str(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

/// Strips leading and trailing whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimWhitespace;

impl Normalizer for TrimWhitespace {
    fn normalize(&self, value: Value) -> Value {
        map_str(value, |s| s.trim().to_string())
    }
}

/// Canonical line endings for multi-line blocks
///
/// `\r\n` and lone `\r` become `\n`, trailing whitespace is removed from each
/// line and leading/trailing blank lines are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeLineEndings;

impl Normalizer for NormalizeLineEndings {
    fn normalize(&self, value: Value) -> Value {
        map_str(value, |s| {
            let unified = s.replace("\r\n", "\n").replace('\r', "\n");
            let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
            lines.join("\n").trim().to_string()
        })
    }
}

/// Case folding for case-insensitive identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFold {
    /// Fold to lower case (logins, organization names)
    Lower,
    /// Fold to upper case (variable names)
    Upper,
}

impl Normalizer for CaseFold {
    fn normalize(&self, value: Value) -> Value {
        map_str(value, |s| match self {
            Self::Lower => s.trim().to_lowercase(),
            Self::Upper => s.trim().to_uppercase(),
        })
    }
}

/// OpenSSH public keys as `<algorithm> <base64>`
///
/// The trailing comment, which the service may drop or rewrite, is removed and
/// any run of whitespace or line breaks becomes a single space.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshPublicKey;

impl Normalizer for SshPublicKey {
    fn normalize(&self, value: Value) -> Value {
        map_str(value, |s| {
            let tokens: Vec<&str> = s.split_whitespace().take(2).collect();
            tokens.join(" ")
        })
    }
}

/// Applies several normalizers in order
#[derive(Clone, Default)]
pub struct Chain(Vec<Arc<dyn Normalizer>>);

impl Chain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a normalizer
    pub fn then(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.0.push(Arc::new(normalizer));
        self
    }
}

impl Normalizer for Chain {
    fn normalize(&self, value: Value) -> Value {
        self.0.iter().fold(value, |v, n| n.normalize(v))
    }
}

/// OpenSSH-style `SHA256:` fingerprint of a public key
///
/// Returns `None` when the key has no decodable base64 blob.
pub fn ssh_fingerprint(key: &str) -> Option<String> {
    let blob = key.split_whitespace().nth(1)?;
    let decoded = STANDARD.decode(blob).ok()?;
    let digest = Sha256::digest(&decoded);
    Some(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}

/// Normalize every attribute of an object that has a normalizer in `schema`
///
/// Recurses into nested blocks. Null and unknown values and attributes the
/// schema does not declare are passed through unchanged.
pub fn normalize_object(schema: &Schema, object: Object) -> Object {
    object
        .into_iter()
        .map(|(name, value)| {
            let value = match (schema.attribute(&name), value) {
                (Some(attribute), AttrValue::Known(known)) => {
                    let known = match attribute.normalizer() {
                        Some(normalizer) => normalizer.normalize(known),
                        None => known,
                    };
                    let known = match (attribute.block(), known) {
                        (Some(block), Value::Object(inner)) => {
                            Value::Object(normalize_object(block, inner))
                        }
                        (_, other) => other,
                    };
                    AttrValue::Known(known)
                }
                (_, value) => value,
            };
            (name, value)
        })
        .collect()
}

/// Drop nulls and attributes `schema` does not declare
///
/// Recurses into nested blocks, so keys the service adds inside a block are
/// dropped as well.
pub fn prune_object(schema: &Schema, object: Object) -> Object {
    object
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(name, value)| {
            let attribute = schema.attribute(&name)?;
            let value = match (attribute.block(), value) {
                (Some(block), AttrValue::Known(Value::Object(inner))) => {
                    AttrValue::Known(Value::Object(prune_object(block, inner)))
                }
                (_, value) => value,
            };
            Some((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMqXgRLKG73K+sIxs5oj3E2nhu/4FHxOcrmAd4Wv7ki7";

    fn apply(normalizer: &dyn Normalizer, s: &str) -> String {
        match normalizer.normalize(Value::from(s)) {
            Value::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_line_endings() {
        let raw = "line one  \r\nline two\rline three\n\n";
        assert_eq!(apply(&NormalizeLineEndings, raw), "line one\nline two\nline three");
    }

    #[test]
    fn test_ssh_key_drops_comment_and_whitespace() {
        let raw = format!("  {KEY}   user@laptop\r\n");
        assert_eq!(apply(&SshPublicKey, &raw), KEY);

        let wrapped = KEY.replacen(' ', "\n", 1);
        assert_eq!(apply(&SshPublicKey, &wrapped), KEY);
    }

    #[test]
    fn test_case_fold() {
        assert_eq!(apply(&CaseFold::Upper, " deploy_key "), "DEPLOY_KEY");
        assert_eq!(apply(&CaseFold::Lower, "Octocat"), "octocat");
    }

    #[test]
    fn test_non_strings_pass_through() {
        assert_eq!(TrimWhitespace.normalize(Value::Int(3)), Value::Int(3));
    }

    #[test]
    fn test_fingerprint_ignores_comment() {
        let with_comment = format!("{KEY} someone@example");
        let fingerprint = ssh_fingerprint(KEY).unwrap();
        assert_eq!(fingerprint, "SHA256:tiMhMnRPrlvkQ5cs0JKKkfs5jVh0z0YO308IwZMTntU");
        assert_eq!(ssh_fingerprint(&with_comment), Some(fingerprint));
        assert_eq!(ssh_fingerprint("ssh-ed25519 not*base64"), None);
        assert_eq!(ssh_fingerprint("ssh-ed25519"), None);
    }

    #[test]
    fn test_normalize_object_recurses_into_blocks() {
        let schema = Schema::new()
            .with_attribute(
                "name",
                Attribute::required_string().with_normalizer(CaseFold::Upper),
            )
            .with_attribute(
                "nested",
                Attribute::optional_block(Schema::new().with_attribute(
                    "login",
                    Attribute::optional_string().with_normalizer(CaseFold::Lower),
                )),
            );
        let object = Object::new()
            .with("name", "token")
            .with("nested", Object::new().with("login", "Octocat"))
            .with("other", "Untouched");

        let normalized = normalize_object(&schema, object);

        assert_eq!(normalized.get_str("name"), Some("TOKEN"));
        assert_eq!(normalized.get_str("other"), Some("Untouched"));
        let nested = normalized.get("nested").known().and_then(Value::as_object).unwrap();
        assert_eq!(nested.get_str("login"), Some("octocat"));
    }

    #[test]
    fn test_prune_object_drops_undeclared_nested_keys() {
        let schema = Schema::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "policy",
                Attribute::optional_block(
                    Schema::new().with_attribute("protected", Attribute::optional_bool()),
                ),
            );
        let object = Object::new()
            .with("name", "production")
            .with("node_id", "EN_kwDO")
            .with("note", AttrValue::Null)
            .with(
                "policy",
                Object::new()
                    .with("protected", true)
                    .with("url", "https://api.github.com/x")
                    .with("custom", AttrValue::Null),
            );

        let pruned = prune_object(&schema, object);

        assert_eq!(pruned.names().collect::<Vec<_>>(), vec!["name", "policy"]);
        let policy = pruned.get("policy").known().and_then(Value::as_object).unwrap();
        assert_eq!(policy, &Object::new().with("protected", true));
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = Chain::new().then(SshPublicKey).then(TrimWhitespace);
        let once = apply(&chain, &format!("{KEY} comment"));
        assert_eq!(apply(&chain, &once), once);
    }
}
