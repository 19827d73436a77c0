//! GitHub REST responses and request bodies
//!
//! The HTTP client is supplied by the embedder. These helpers keep the
//! translation between GitHub's JSON and the core's types in one place so
//! every `RemoteClient` implementation classifies failures the same way.

use forgeprov_core::{AttrValue, Object, RemoteEntity, RemoteError, RemoteId};
use serde_json::{Map, Value as Json};
use tracing::debug;

/// Classify a non-success HTTP response
///
/// | Status                          | Error       |
/// |---------------------------------|-------------|
/// | 404                             | `NotFound`  |
/// | 409, 422 "already exists"       | `Conflict`  |
/// | 403 mentioning a rate limit     | `Transient` |
/// | 429, 5xx                        | `Transient` |
/// | anything else                   | `Rejected`  |
///
/// The response body is kept verbatim in the message.
pub fn classify_status(status: u16, body: &str) -> RemoteError {
    let message = format!("HTTP {status}: {}", body.trim());
    match status {
        404 => RemoteError::NotFound(message),
        409 => RemoteError::Conflict(message),
        422 if body.contains("already exists") => RemoteError::Conflict(message),
        403 if body.to_ascii_lowercase().contains("rate limit") => RemoteError::Transient(message),
        429 | 500..=599 => RemoteError::Transient(message),
        _ => RemoteError::Rejected(message),
    }
}

/// Read an identifier field that GitHub may send as a number or a string
pub fn json_id(payload: &Json, field: &str) -> Option<RemoteId> {
    match payload.get(field)? {
        Json::String(s) => Some(RemoteId::new(s.clone())),
        Json::Number(n) => Some(RemoteId::new(n.to_string())),
        _ => None,
    }
}

/// Convert a JSON object returned by GitHub into a remote entity
///
/// Fields whose JSON type has no attribute equivalent (floats) are skipped;
/// fields outside the kind's schema are dropped later by canonicalization.
///
/// # Returns
///
/// - `Ok(RemoteEntity)`: the entity, attributes not yet normalized
/// - `Err(RemoteError::Rejected)`: the payload is not a JSON object
pub fn entity_from_json(id: impl Into<RemoteId>, payload: Json) -> Result<RemoteEntity, RemoteError> {
    let fields = match payload {
        Json::Object(fields) => fields,
        other => {
            return Err(RemoteError::Rejected(format!(
                "expected a JSON object, got {other}"
            )));
        }
    };

    let attributes: Object = fields
        .into_iter()
        .filter_map(|(name, value)| match serde_json::from_value::<AttrValue>(value) {
            Ok(value) => Some((name, value)),
            Err(e) => {
                debug!("Skipping response field {}: {}", name, e);
                None
            }
        })
        .collect();

    Ok(RemoteEntity::new(id, attributes))
}

/// Build a JSON request body from create or update fields
///
/// Explicit nulls are kept: GitHub clears an attribute when it is sent as
/// `null`, which is how an update removes an optional setting.
///
/// # Returns
///
/// - `Ok(Json)`: the request body
/// - `Err(RemoteError::Rejected)`: a field is still unknown
pub fn request_body(fields: &Object) -> Result<Json, RemoteError> {
    let mut body = Map::new();
    for (name, value) in fields.iter() {
        let json = match value {
            AttrValue::Null => Json::Null,
            AttrValue::Known(known) => serde_json::to_value(known)
                .map_err(|e| RemoteError::Rejected(format!("cannot encode {name}: {e}")))?,
            AttrValue::Unknown => {
                return Err(RemoteError::Rejected(format!("{name} is not known yet")));
            }
        };
        body.insert(name.to_string(), json);
    }
    Ok(Json::Object(body))
}
