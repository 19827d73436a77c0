// Common test utilities for the GitHub kind contract tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use forgeprov_core::reconciler::ReconcileEvent;
use forgeprov_core::{
    Object, ProviderConfig, ProviderEngine, RemoteClient, RemoteEntity, RemoteError, RemoteId,
    ResourceRegistry,
};
use forgeprov_github::payload::{classify_status, entity_from_json, json_id, request_body};
use forgeprov_github::{actions_variable, environment, membership, ssh_key};
use serde_json::{Map, Value as Json, json};
use tokio::sync::mpsc;

/// An ed25519 key as a user would paste it, comment included
pub const LAPTOP_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMqXgRLKG73K+sIxs5oj3E2nhu/4FHxOcrmAd4Wv7ki7 octocat@laptop";

/// [`LAPTOP_KEY`] as GitHub stores it
pub const LAPTOP_KEY_STORED: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMqXgRLKG73K+sIxs5oj3E2nhu/4FHxOcrmAd4Wv7ki7";

/// Fingerprint of [`LAPTOP_KEY`]
pub const LAPTOP_FINGERPRINT: &str = "SHA256:tiMhMnRPrlvkQ5cs0JKKkfs5jVh0z0YO308IwZMTntU";

/// A second ed25519 key
pub const DESKTOP_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAID4j6BYAOVlKM4lPZWThsTSLvXoAiNQsSstz7q7VnACd";

/// Fingerprint of [`DESKTOP_KEY`]
pub const DESKTOP_FINGERPRINT: &str = "SHA256:En3DWSl9KEPNKUwZpsdUirnZ2O5AERXiCuTijiQYBNk";

/// In-memory stand-in for the GitHub REST API
///
/// Requests are encoded with [`request_body`], responses decoded with
/// [`entity_from_json`], and failures raised as HTTP statuses through
/// [`classify_status`], so the tests exercise the same translation a real
/// client performs. Server-side behavior mirrors GitHub: numeric key ids,
/// key comments stripped, default roles, upper-cased variable names.
#[derive(Clone, Default)]
pub struct FakeGitHub {
    entities: Arc<Mutex<BTreeMap<(String, RemoteId), Map<String, Json>>>>,
    next_key_id: Arc<AtomicUsize>,
    clock: Arc<AtomicUsize>,
    get_call_count: Arc<AtomicUsize>,
    create_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    delete_call_count: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<&'static str, (u16, String)>>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next call to `op` with an HTTP error
    pub fn fail_next(&self, op: &'static str, status: u16, body: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op, (status, body.to_string()));
    }

    /// Raw JSON GitHub holds for an entity
    pub fn remote(&self, kind: &str, id: &str) -> Option<Json> {
        self.entities
            .lock()
            .unwrap()
            .get(&(kind.to_string(), RemoteId::new(id)))
            .map(|fields| Json::Object(fields.clone()))
    }

    /// Create or overwrite an entity behind the system's back
    pub fn insert_remote(&self, kind: &str, id: &str, payload: Json) {
        if let Json::Object(fields) = payload {
            self.entities
                .lock()
                .unwrap()
                .insert((kind.to_string(), RemoteId::new(id)), fields);
        }
    }

    /// Change one field behind the system's back
    pub fn modify_remote(&self, kind: &str, id: &str, field: &str, value: Json) {
        if let Some(fields) = self
            .entities
            .lock()
            .unwrap()
            .get_mut(&(kind.to_string(), RemoteId::new(id)))
        {
            fields.insert(field.to_string(), value);
        }
    }

    /// Number of entities of `kind`
    pub fn count(&self, kind: &str) -> usize {
        self.entities
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, _)| k == kind)
            .count()
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

    /// Calls that change the service
    pub fn mutation_count(&self) -> usize {
        self.create_call_count() + self.update_call_count() + self.delete_call_count()
    }

    pub fn total_call_count(&self) -> usize {
        self.get_call_count() + self.mutation_count()
    }

    /// Ordered call log, e.g. `["create github_user_ssh_key", "delete github_user_ssh_key 1"]`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, counter: &AtomicUsize, call: String) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);
    }

    fn injected(&self, op: &'static str) -> Result<(), RemoteError> {
        match self.failures.lock().unwrap().remove(op) {
            Some((status, body)) => Err(classify_status(status, &body)),
            None => Ok(()),
        }
    }

    fn timestamp(&self) -> String {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        format!("2026-01-01T00:{:02}:{:02}Z", tick / 60, tick % 60)
    }

    fn not_found() -> RemoteError {
        classify_status(404, r#"{"message":"Not Found"}"#)
    }

    /// Apply GitHub's server-side rules to a create request
    fn accept_create(
        &self,
        kind: &str,
        mut fields: Map<String, Json>,
    ) -> Result<(RemoteId, Map<String, Json>), RemoteError> {
        let str_field = |fields: &Map<String, Json>, name: &str| {
            fields
                .get(name)
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let id = match kind {
            ssh_key::TYPE_NAME => {
                let key = str_field(&fields, "key");
                let stored: Vec<&str> = key.split_whitespace().take(2).collect();
                let stored = stored.join(" ");
                let duplicate = self.entities.lock().unwrap().iter().any(|((k, _), e)| {
                    k == kind && e.get("key").and_then(Json::as_str) == Some(stored.as_str())
                });
                if duplicate {
                    return Err(classify_status(
                        422,
                        r#"{"message":"Validation Failed","errors":[{"message":"key is already in use"}]}"#,
                    ));
                }

                let number = self.next_key_id.fetch_add(1, Ordering::SeqCst) + 1;
                fields.insert("id".to_string(), json!(number));
                fields.insert("key".to_string(), json!(stored));
                fields.insert(
                    "url".to_string(),
                    json!(format!("https://api.github.com/user/keys/{number}")),
                );
                fields.insert("verified".to_string(), json!(false));
                fields.insert("created_at".to_string(), json!(self.timestamp()));
                RemoteId::new(number.to_string())
            }
            membership::TYPE_NAME => {
                fields.entry("role").or_insert_with(|| json!("member"));
                fields.insert("state".to_string(), json!("active"));
                RemoteId::new(format!(
                    "{}:{}",
                    str_field(&fields, "organization").to_lowercase(),
                    str_field(&fields, "username").to_lowercase()
                ))
            }
            actions_variable::TYPE_NAME => {
                let name = str_field(&fields, "variable_name").to_uppercase();
                fields.insert("variable_name".to_string(), json!(name));
                let now = self.timestamp();
                fields.insert("created_at".to_string(), json!(now));
                fields.insert("updated_at".to_string(), json!(now));
                RemoteId::new(format!("{}:{}", str_field(&fields, "repository"), name))
            }
            environment::TYPE_NAME => {
                fields
                    .entry("can_admins_bypass")
                    .or_insert_with(|| json!(true));
                fields.insert(
                    "html_url".to_string(),
                    json!(format!(
                        "https://github.com/{}/deployments",
                        str_field(&fields, "repository")
                    )),
                );
                if let Some(Json::Object(policy)) = fields.get_mut("deployment_branch_policy") {
                    policy.insert(
                        "url".to_string(),
                        json!("https://api.github.com/deployment-branch-policies"),
                    );
                }
                RemoteId::new(format!(
                    "{}:{}",
                    str_field(&fields, "repository"),
                    str_field(&fields, "environment")
                ))
            }
            other => {
                return Err(classify_status(404, &format!("no endpoint for {other}")));
            }
        };

        if kind != ssh_key::TYPE_NAME
            && self
                .entities
                .lock()
                .unwrap()
                .contains_key(&(kind.to_string(), id.clone()))
        {
            return Err(classify_status(
                422,
                &format!(r#"{{"message":"{id} already exists"}}"#),
            ));
        }
        Ok((id, fields))
    }

    fn respond(id: &RemoteId, fields: Map<String, Json>) -> Result<RemoteEntity, RemoteError> {
        let payload = Json::Object(fields);
        let id = json_id(&payload, "id").unwrap_or_else(|| id.clone());
        entity_from_json(id, payload)
    }
}

#[async_trait::async_trait]
impl RemoteClient for FakeGitHub {
    async fn get(&self, kind: &str, id: &RemoteId) -> Result<RemoteEntity, RemoteError> {
        self.record(&self.get_call_count, format!("get {kind} {id}"));
        self.injected("get")?;

        let fields = self
            .entities
            .lock()
            .unwrap()
            .get(&(kind.to_string(), id.clone()))
            .cloned()
            .ok_or_else(Self::not_found)?;
        Self::respond(id, fields)
    }

    async fn create(&self, kind: &str, fields: &Object) -> Result<RemoteEntity, RemoteError> {
        self.record(&self.create_call_count, format!("create {kind}"));
        self.injected("create")?;

        let Json::Object(body) = request_body(fields)? else {
            return Err(classify_status(400, "Problems parsing JSON"));
        };
        let body: Map<String, Json> = body.into_iter().filter(|(_, v)| !v.is_null()).collect();
        let (id, stored) = self.accept_create(kind, body)?;

        self.entities
            .lock()
            .unwrap()
            .insert((kind.to_string(), id.clone()), stored.clone());
        Self::respond(&id, stored)
    }

    async fn update(
        &self,
        kind: &str,
        id: &RemoteId,
        changed: &Object,
    ) -> Result<RemoteEntity, RemoteError> {
        self.record(&self.update_call_count, format!("update {kind} {id}"));
        self.injected("update")?;

        let Json::Object(body) = request_body(changed)? else {
            return Err(classify_status(400, "Problems parsing JSON"));
        };
        let now = self.timestamp();
        let stored = {
            let mut entities = self.entities.lock().unwrap();
            let entity = entities
                .get_mut(&(kind.to_string(), id.clone()))
                .ok_or_else(Self::not_found)?;
            for (name, value) in body {
                if value.is_null() {
                    entity.remove(&name);
                } else {
                    entity.insert(name, value);
                }
            }
            if kind == actions_variable::TYPE_NAME {
                entity.insert("updated_at".to_string(), json!(now));
            }
            entity.clone()
        };
        Self::respond(id, stored)
    }

    async fn delete(&self, kind: &str, id: &RemoteId) -> Result<(), RemoteError> {
        self.record(&self.delete_call_count, format!("delete {kind} {id}"));
        self.injected("delete")?;

        match self
            .entities
            .lock()
            .unwrap()
            .remove(&(kind.to_string(), id.clone()))
        {
            Some(_) => Ok(()),
            None => Err(Self::not_found()),
        }
    }

    fn client_name(&self) -> &'static str {
        "fake-github"
    }
}

/// Registry with the built-in stores and every GitHub kind
pub fn github_registry() -> Arc<ResourceRegistry> {
    let registry = ResourceRegistry::with_builtin_stores();
    forgeprov_github::register(&registry);
    Arc::new(registry)
}

/// Engine over an in-memory store with default settings
pub async fn github_engine(
    client: &FakeGitHub,
) -> (ProviderEngine, mpsc::Receiver<ReconcileEvent>) {
    ProviderEngine::from_config(
        github_registry(),
        Arc::new(client.clone()),
        ProviderConfig::new(),
    )
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
