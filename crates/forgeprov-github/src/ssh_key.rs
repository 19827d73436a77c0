//! `github_user_ssh_key`: an SSH public key on the authenticated user
//!
//! GitHub cannot edit a key in place, so both configurable attributes force
//! replacement. The service keeps the key without its comment, which the
//! normalizer drops on both sides of every comparison.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use forgeprov_core::normalize::{SshPublicKey, TrimWhitespace, ssh_fingerprint};
use forgeprov_core::schema::{Attribute, Schema};
use forgeprov_core::validate::{NotEmpty, ValidationContext, Validator, Violation, Violations};
use forgeprov_core::{Object, ResourceKind, Value};

/// Type name of the kind
pub const TYPE_NAME: &str = "github_user_ssh_key";

/// Key algorithms GitHub accepts
pub const SUPPORTED_ALGORITHMS: &[&str] = &[
    "ssh-ed25519",
    "ssh-rsa",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
    "sk-ecdsa-sha2-nistp256@openssh.com",
];

/// Accepts OpenSSH public keys of a supported algorithm
///
/// The base64 blob must decode and name the same algorithm as the key's
/// first token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicKeyFormat;

impl PublicKeyFormat {
    /// Problem with `key`, or `None` when it is acceptable
    pub fn check(key: &str) -> Option<String> {
        let mut tokens = key.split_whitespace();
        let (Some(algorithm), Some(blob)) = (tokens.next(), tokens.next()) else {
            return Some("must have the form \"<algorithm> <base64 key> [comment]\"".to_string());
        };

        if !SUPPORTED_ALGORITHMS.contains(&algorithm) {
            return Some(format!("unsupported key algorithm {algorithm:?}"));
        }

        let Ok(decoded) = STANDARD.decode(blob) else {
            return Some("key data is not valid base64".to_string());
        };

        match embedded_algorithm(&decoded) {
            Some(embedded) if embedded == algorithm.as_bytes() => None,
            _ => Some(format!("key data does not match algorithm {algorithm:?}")),
        }
    }
}

impl Validator for PublicKeyFormat {
    fn description(&self) -> String {
        "an OpenSSH public key".to_string()
    }

    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations) {
        let Some(key) = value.as_str() else {
            return;
        };
        if let Some(problem) = Self::check(key) {
            out.push(Violation::new(ctx.path.clone(), problem));
        }
    }
}

/// Algorithm name at the start of a decoded key blob
///
/// The blob begins with a big-endian `u32` length followed by the name.
fn embedded_algorithm(blob: &[u8]) -> Option<&[u8]> {
    let len: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let end = 4usize.checked_add(u32::from_be_bytes(len) as usize)?;
    blob.get(4..end)
}

/// SSH key resource kind
pub struct UserSshKey {
    schema: Schema,
}

impl UserSshKey {
    pub fn new() -> Self {
        Self {
            schema: Schema::new()
                .with_attribute(
                    "title",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NotEmpty)
                        .with_normalizer(TrimWhitespace),
                )
                .with_attribute(
                    "key",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(PublicKeyFormat)
                        .with_normalizer(SshPublicKey),
                )
                .with_attribute("fingerprint", Attribute::computed_string())
                .with_attribute("url", Attribute::computed_string())
                .with_attribute("etag", Attribute::computed_string()),
        }
    }
}

impl Default for UserSshKey {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for UserSshKey {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn derive(&self, attributes: &mut Object) {
        attributes.remove("fingerprint");
        if let Some(fingerprint) = attributes.get_str("key").and_then(ssh_fingerprint) {
            attributes.set("fingerprint", fingerprint);
        }
    }

    fn check_import_parts(&self, parts: &[&str]) -> Result<(), String> {
        if parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
            Ok(())
        } else {
            Err("key id must be numeric".to_string())
        }
    }
}
