// Common test utilities for contract tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forgeprov_core::normalize::{CaseFold, SshPublicKey, ssh_fingerprint};
use forgeprov_core::reconciler::ReconcileEvent;
use forgeprov_core::schema::{Attribute, Schema};
use forgeprov_core::validate::{ConflictsWith, NamingValidator, OneOf, Violation};
use forgeprov_core::{
    AttrPath, Object, ProviderConfig, ProviderEngine, RemoteClient, RemoteEntity, RemoteError,
    RemoteId, ResourceKind, ResourceRegistry, Violations,
};
use tokio::sync::mpsc;

/// Type name of the test resource kind
pub const KIND: &str = "test_credential";

/// Reserved name prefix enforced by the test kind
pub const RESERVED_PREFIX: &str = "GITHUB_";

/// A valid ed25519 public key with a trailing comment
pub const KEY_A: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMqXgRLKG73K+sIxs5oj3E2nhu/4FHxOcrmAd4Wv7ki7 alice@laptop";

/// SHA256 fingerprint of [`KEY_A`]
pub const KEY_A_FINGERPRINT: &str = "SHA256:tiMhMnRPrlvkQ5cs0JKKkfs5jVh0z0YO308IwZMTntU";

/// A second, different public key
pub const KEY_B: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAID4j6BYAOVlKM4lPZWThsTSLvXoAiNQsSstz7q7VnACd";

/// SHA256 fingerprint of [`KEY_B`]
pub const KEY_B_FINGERPRINT: &str = "SHA256:En3DWSl9KEPNKUwZpsdUirnZ2O5AERXiCuTijiQYBNk";

/// Resource kind used by the contract tests
///
/// A deploy credential: owner and name identify it, the key material forces
/// replacement, the description updates in place, and the fingerprint is
/// derived from the key.
pub struct TestCredential {
    schema: Schema,
}

impl TestCredential {
    pub fn new() -> Self {
        let settings = Schema::new()
            .with_attribute(
                "allow_all",
                Attribute::optional_bool().with_validator(ConflictsWith::new(["allowed_teams"])),
            )
            .with_attribute(
                "allowed_teams",
                Attribute::optional_list().with_validator(ConflictsWith::new(["allow_all"])),
            );

        Self {
            schema: Schema::new()
                .with_attribute(
                    "owner",
                    Attribute::required_string()
                        .force_replace()
                        .with_normalizer(CaseFold::Lower),
                )
                .with_attribute(
                    "name",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NamingValidator::new(RESERVED_PREFIX))
                        .with_normalizer(CaseFold::Upper),
                )
                .with_attribute(
                    "content",
                    Attribute::required_string()
                        .force_replace()
                        .with_normalizer(SshPublicKey),
                )
                .with_attribute("description", Attribute::optional_string())
                .with_attribute(
                    "visibility",
                    Attribute::optional_computed_string()
                        .with_validator(OneOf::new(["all", "private", "selected"])),
                )
                .with_attribute("settings", Attribute::optional_block(settings))
                .with_attribute("fingerprint", Attribute::computed_string())
                .with_attribute("etag", Attribute::computed_string()),
        }
    }
}

impl ResourceKind for TestCredential {
    fn type_name(&self) -> &'static str {
        KIND
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, config: &Object, out: &mut Violations) {
        if config.get_str("visibility") != Some("selected") {
            return;
        }
        let settings = config.get("settings");
        if settings.is_unknown() {
            return;
        }
        let teams = settings
            .known()
            .and_then(|settings| settings.as_object())
            .map(|settings| settings.get("allowed_teams"));
        match teams {
            Some(teams) if !teams.is_null() => {}
            _ => out.push(Violation::new(
                AttrPath::attr("settings").child("allowed_teams"),
                "required when visibility is \"selected\"",
            )),
        }
    }

    fn derive(&self, attributes: &mut Object) {
        attributes.remove("fingerprint");
        if let Some(fingerprint) = attributes.get_str("content").and_then(ssh_fingerprint) {
            attributes.set("fingerprint", fingerprint);
        }
    }

    fn import_id_parts(&self) -> &'static [&'static str] {
        &["owner", "name"]
    }

    fn check_import_parts(&self, parts: &[&str]) -> Result<(), String> {
        let problems = NamingValidator::new(RESERVED_PREFIX).check(parts[1]);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(format!("name {}", problems.join("; ")))
        }
    }

    fn remote_id_from_parts(&self, parts: &[&str]) -> RemoteId {
        match parts {
            [owner, name] => credential_id(owner, name),
            _ => RemoteId::new(parts.join(":")),
        }
    }
}

/// Remote identifier the mock assigns to a credential
pub fn credential_id(owner: &str, name: &str) -> RemoteId {
    RemoteId::new(format!("{}:{}", owner.to_lowercase(), name.to_uppercase()))
}

/// A valid configuration for the test kind
pub fn credential(name: &str, content: &str) -> Object {
    Object::new()
        .with("owner", "acme")
        .with("name", name)
        .with("content", content)
}

/// Mock remote service for testing
///
/// Keeps entities in memory, counts calls per operation, and can inject
/// one-shot failures, reformat its responses, or stall creates.
#[derive(Clone, Default)]
pub struct MockRemoteClient {
    entities: Arc<Mutex<BTreeMap<RemoteId, Object>>>,
    revision: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
    keyed_by: Option<&'static [&'static str]>,
    get_call_count: Arc<AtomicUsize>,
    create_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    delete_call_count: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<&'static str, RemoteError>>>,
    reformat: Arc<AtomicBool>,
    create_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockRemoteClient {
    /// Mock that assigns numeric identifiers
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose identifiers are the given fields joined by `:`
    ///
    /// Creating an entity whose identifier already exists is a conflict.
    pub fn keyed_by(fields: &'static [&'static str]) -> Self {
        Self {
            keyed_by: Some(fields),
            ..Self::default()
        }
    }

    /// Mock keyed the way the test kind expects
    pub fn for_credentials() -> Self {
        Self::keyed_by(&["owner", "name"])
    }

    /// Respond with re-spaced keys, comments and upper-cased owners
    pub fn with_reformatting(self) -> Self {
        self.reformat.store(true, Ordering::SeqCst);
        self
    }

    /// Stall every create for `delay` before it takes effect
    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    /// Fail the next call to `op` (`get`, `create`, `update`, `delete`)
    pub fn fail_next(&self, op: &'static str, err: RemoteError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    /// Put an entity on the service behind the system's back
    pub fn insert_remote(&self, id: impl Into<RemoteId>, attributes: Object) {
        self.entities.lock().unwrap().insert(id.into(), attributes);
    }

    /// Change one attribute behind the system's back
    pub fn modify_remote(&self, id: &RemoteId, name: &str, value: &str) {
        if let Some(entity) = self.entities.lock().unwrap().get_mut(id) {
            entity.set(name, value);
        }
    }

    /// Delete an entity behind the system's back
    pub fn remove_remote(&self, id: &RemoteId) {
        self.entities.lock().unwrap().remove(id);
    }

    /// Current remote attributes of an entity
    pub fn remote(&self, id: &RemoteId) -> Option<Object> {
        self.entities.lock().unwrap().get(id).cloned()
    }

    /// Number of entities on the service
    pub fn remote_len(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    /// Calls that change the service (create, update, delete)
    pub fn mutation_count(&self) -> usize {
        self.create_call_count() + self.update_call_count() + self.delete_call_count()
    }

    /// Every call, in order
    pub fn total_call_count(&self) -> usize {
        self.get_call_count() + self.mutation_count()
    }

    /// Ordered call log, e.g. `["create", "delete acme:DEPLOY"]`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, counter: &AtomicUsize, call: String) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);
    }

    fn injected(&self, op: &'static str) -> Result<(), RemoteError> {
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_etag(&self) -> String {
        format!("\"r{}\"", self.revision.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn respond(&self, id: RemoteId, mut attributes: Object) -> RemoteEntity {
        if self.reformat.load(Ordering::SeqCst) {
            if let Some(content) = attributes.get_str("content").map(str::to_string) {
                attributes.set(
                    "content",
                    format!("{}  generated-by-service\r\n", content.replace(' ', "  ")),
                );
            }
            if let Some(owner) = attributes.get_str("owner").map(str::to_uppercase) {
                attributes.set("owner", owner);
            }
        }
        RemoteEntity::new(id, attributes)
    }
}

#[async_trait::async_trait]
impl RemoteClient for MockRemoteClient {
    async fn get(&self, _kind: &str, id: &RemoteId) -> Result<RemoteEntity, RemoteError> {
        self.record(&self.get_call_count, format!("get {id}"));
        self.injected("get")?;

        let attributes = self
            .entities
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("no entity {id}")))?;
        Ok(self.respond(id.clone(), attributes))
    }

    async fn create(&self, _kind: &str, fields: &Object) -> Result<RemoteEntity, RemoteError> {
        self.record(&self.create_call_count, "create".to_string());
        self.injected("create")?;

        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let id = match self.keyed_by {
            Some(keys) => RemoteId::new(
                keys.iter()
                    .map(|k| fields.get_str(k).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(":"),
            ),
            None => RemoteId::new((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()),
        };

        let mut attributes = fields.clone().without_nulls();
        if attributes.get("visibility").is_null() {
            attributes.set("visibility", "private");
        }
        attributes.set("etag", self.next_etag());

        {
            let mut entities = self.entities.lock().unwrap();
            if entities.contains_key(&id) {
                return Err(RemoteError::Conflict(format!("{id} already exists")));
            }
            entities.insert(id.clone(), attributes.clone());
        }
        Ok(self.respond(id, attributes))
    }

    async fn update(
        &self,
        _kind: &str,
        id: &RemoteId,
        changed: &Object,
    ) -> Result<RemoteEntity, RemoteError> {
        self.record(&self.update_call_count, format!("update {id}"));
        self.injected("update")?;

        let etag = self.next_etag();
        let attributes = {
            let mut entities = self.entities.lock().unwrap();
            let entity = entities
                .get_mut(id)
                .ok_or_else(|| RemoteError::NotFound(format!("no entity {id}")))?;
            for (name, value) in changed.iter() {
                if value.is_null() {
                    entity.remove(name);
                } else {
                    entity.set(name, value.clone());
                }
            }
            entity.set("etag", etag);
            entity.clone()
        };
        Ok(self.respond(id.clone(), attributes))
    }

    async fn delete(&self, _kind: &str, id: &RemoteId) -> Result<(), RemoteError> {
        self.record(&self.delete_call_count, format!("delete {id}"));
        self.injected("delete")?;

        match self.entities.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(format!("no entity {id}"))),
        }
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// Registry with the built-in stores and the test kind
pub fn test_registry() -> Arc<ResourceRegistry> {
    let registry = ResourceRegistry::with_builtin_stores();
    registry.register_kind(Arc::new(TestCredential::new()));
    Arc::new(registry)
}

/// Engine over an in-memory store with default settings
pub async fn test_engine(
    client: &MockRemoteClient,
) -> (ProviderEngine, mpsc::Receiver<ReconcileEvent>) {
    test_engine_with(client, ProviderConfig::new()).await
}

/// Engine over an in-memory store that never refreshes before apply
pub async fn test_engine_without_refresh(
    client: &MockRemoteClient,
) -> (ProviderEngine, mpsc::Receiver<ReconcileEvent>) {
    let mut config = ProviderConfig::new();
    config.engine.refresh_before_apply = false;
    test_engine_with(client, config).await
}

/// Engine built from an explicit configuration
pub async fn test_engine_with(
    client: &MockRemoteClient,
    config: ProviderConfig,
) -> (ProviderEngine, mpsc::Receiver<ReconcileEvent>) {
    ProviderEngine::from_config(test_registry(), Arc::new(client.clone()), config)
        .await
        .expect("Engine construction should succeed")
}

/// Drain every event currently buffered on the channel
pub fn drain_events(rx: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
