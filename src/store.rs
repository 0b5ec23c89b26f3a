//! Document Store
//!
//! The external document database reduced to the operations this pipeline
//! needs: get, create-only insert, versioned compare-and-swap, delete. Every
//! aggregate mutation goes through [`apply_once`], an optimistic retry loop
//! that also threads the event's idempotency key through a bounded window
//! inside the document, so redelivered logs are detected atomically with the
//! write instead of double-counting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{APPLIED_WINDOW, MAX_UPDATE_RETRIES};

/// Document field holding the CAS version
pub const VERSION_FIELD: &str = "_version";

/// Document field holding the bounded idempotency-key window
pub const APPLIED_FIELD: &str = "_applied";

/// Collection names: a stable, versioned contract with downstream readers.
pub mod collections {
    // Aggregates
    pub const CAMPAIGNS: &str = "campaigns";
    pub const CAMPAIGN_YIELD: &str = "campaign_yield";
    pub const TOKENS: &str = "tokens";
    pub const ADMINS: &str = "admins";
    pub const FEE_CONFIG: &str = "fee_config";
    pub const DEFI_CONFIG: &str = "defi_config";
    pub const FACTORY_AUTHORIZATIONS: &str = "factory_authorizations";
    pub const CAMPAIGN_AUTHORIZATIONS: &str = "campaign_authorizations";

    // Append-only audit records, one collection per event family
    pub const CONTRIBUTION_EVENTS: &str = "contribution_events";
    pub const REFUND_EVENTS: &str = "refund_events";
    pub const CLAIM_EVENTS: &str = "claim_events";
    pub const STATUS_CHANGE_EVENTS: &str = "status_change_events";
    pub const ADMIN_OVERRIDE_EVENTS: &str = "admin_override_events";
    pub const FUNDS_OPERATION_EVENTS: &str = "funds_operation_events";
    pub const FACTORY_OPERATION_EVENTS: &str = "factory_operation_events";
    pub const DEFI_OPERATION_EVENTS: &str = "defi_operation_events";
    pub const FEE_OPERATION_EVENTS: &str = "fee_operation_events";
    pub const ADMIN_OPERATION_EVENTS: &str = "admin_operation_events";
    pub const TOKEN_REGISTRY_EVENTS: &str = "token_registry_events";
    pub const COLLECTOR_OPERATION_EVENTS: &str = "collector_operation_events";
}

/// Singleton document id for the fee/defi config aggregates
pub const SINGLETON_ID: &str = "global";

/// Errors surfaced by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("conflicting writes on {collection}/{id} after {attempts} attempts")]
    Conflict {
        collection: String,
        id: String,
        attempts: u32,
    },
}

/// Key-value store with document semantics, the pipeline's only shared
/// mutable resource.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` if absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Create-only write. Returns `false` (without writing) when the document
    /// already exists; this is what makes audit inserts idempotent.
    async fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<bool, StoreError>;

    /// Versioned compare-and-swap. `expected_version` 0 means
    /// create-if-absent; otherwise the write succeeds only when the stored
    /// document's version field equals `expected_version`.
    async fn compare_and_put(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: Value,
    ) -> Result<bool, StoreError>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// Read the CAS version out of a document; absent or non-numeric is 0.
pub fn doc_version(doc: &Value) -> u64 {
    doc.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0)
}

/// Outcome of an idempotent aggregate update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The mutation was applied and written back.
    Updated,
    /// The event key was already recorded; nothing changed.
    Duplicate,
}

fn split_document(doc: Option<Value>) -> (u64, Map<String, Value>, Vec<String>) {
    let Some(Value::Object(mut map)) = doc else {
        return (0, Map::new(), Vec::new());
    };
    let version = map
        .remove(VERSION_FIELD)
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let applied = map
        .remove(APPLIED_FIELD)
        .and_then(|v| match v {
            Value::Array(keys) => Some(
                keys.into_iter()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();
    (version, map, applied)
}

fn assemble_document(version: u64, body: Map<String, Value>, applied: Vec<String>) -> Value {
    let mut map = body;
    map.insert(VERSION_FIELD.to_string(), Value::from(version));
    map.insert(
        APPLIED_FIELD.to_string(),
        Value::Array(applied.into_iter().map(Value::from).collect()),
    );
    Value::Object(map)
}

/// Apply a mutation to an aggregate exactly once per event key.
///
/// Read-modify-write under optimistic concurrency: the closure receives the
/// document body (meta fields stripped) and may run multiple times if a
/// concurrent writer wins the race. Returns [`Applied::Duplicate`] without
/// writing when the event key is already in the document's applied window.
pub async fn apply_once<F>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    event_key: &str,
    mutate: F,
) -> Result<Applied, StoreError>
where
    F: Fn(&mut Map<String, Value>) -> Result<(), StoreError>,
{
    for _attempt in 0..MAX_UPDATE_RETRIES {
        let current = store.get(collection, id).await?;
        let (version, mut body, mut applied) = split_document(current);

        if applied.iter().any(|key| key == event_key) {
            return Ok(Applied::Duplicate);
        }

        mutate(&mut body)?;

        applied.push(event_key.to_string());
        if applied.len() > APPLIED_WINDOW {
            let excess = applied.len() - APPLIED_WINDOW;
            applied.drain(..excess);
        }

        let doc = assemble_document(version + 1, body, applied);
        if store.compare_and_put(collection, id, version, doc).await? {
            return Ok(Applied::Updated);
        }
        // Lost the race; re-read and try again.
    }

    Err(StoreError::Conflict {
        collection: collection.to_string(),
        id: id.to_string(),
        attempts: MAX_UPDATE_RETRIES,
    })
}

/// In-memory document store used by unit and integration tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    docs: Arc<Mutex<HashMap<(String, String), Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: fetch a document synchronously.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Test helper: number of documents in a collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.docs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.document(collection, id))
    }

    async fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<bool, StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        if docs.contains_key(&key) {
            return Ok(false);
        }
        docs.insert(key, doc);
        Ok(true)
    }

    async fn compare_and_put(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: Value,
    ) -> Result<bool, StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        let current_version = docs.get(&key).map(doc_version).unwrap_or(0);
        if current_version != expected_version {
            return Ok(false);
        }
        docs.insert(key, doc);
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.docs.lock().unwrap();
        Ok(docs.remove(&(collection.to_string(), id.to_string())).is_some())
    }
}
