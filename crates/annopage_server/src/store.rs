//! Versioned in-memory document storage.

use crate::config::StoreConfig;
use crate::error::{ServerError, ServerResult};
use annopage_protocol::{HISTORY_NEXT_EXISTS_KEY, RERUM_HISTORY_NEXT_KEY};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// One stored version of a document.
#[derive(Debug, Clone)]
struct Version {
    fields: Map<String, Value>,
    previous: Option<String>,
    next: Option<String>,
    deleted: bool,
}

impl Version {
    fn is_tip(&self) -> bool {
        self.next.is_none() && !self.deleted
    }
}

#[derive(Debug, Default)]
struct Inner {
    versions: HashMap<String, Version>,
    /// Ids in creation order, so query results are stable.
    order: Vec<String>,
}

/// How an update combines with the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Keys in the request overwrite keys of the current version; `null` removes a key.
    Merge,
    /// The request body becomes the whole new version.
    Replace,
}

/// A store where every write creates a new version with a new id.
///
/// The store maintains:
/// - Every version ever written, linked to its predecessor and successor
/// - Creation order, so queries return documents oldest first
/// - Deletion marks, which hide a version from queries and lookups
pub struct VersionedStore {
    config: StoreConfig,
    inner: RwLock<Inner>,
}

impl VersionedStore {
    /// Creates an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Persists a new document and returns it with its id.
    pub fn create(&self, document: Value) -> ServerResult<Value> {
        let fields = self.strip_ids(document)?;
        let mut inner = self.inner.write();
        Ok(self.insert(&mut inner, fields, None))
    }

    /// Persists a new version of the document named by the body's id.
    pub fn update(&self, document: Value, mode: UpdateMode) -> ServerResult<Value> {
        let map = as_object(document)?;
        let id = self
            .id_in(&map)
            .ok_or_else(|| ServerError::InvalidRequest("update requires an id".into()))?;
        let changes = self.strip_ids(Value::Object(map))?;

        let mut inner = self.inner.write();
        let current = inner
            .versions
            .get(&id)
            .filter(|v| !v.deleted)
            .ok_or_else(|| ServerError::NotFound(id.clone()))?;
        if current.next.is_some() {
            return Err(ServerError::Superseded(id));
        }

        let fields = match mode {
            UpdateMode::Replace => changes,
            UpdateMode::Merge => {
                let mut fields = current.fields.clone();
                for (key, value) in changes {
                    if value.is_null() {
                        fields.remove(&key);
                    } else {
                        fields.insert(key, value);
                    }
                }
                fields
            }
        };

        let stored = self.insert(&mut inner, fields, Some(id.clone()));
        if let Some(new_id) = self.id_in_value(&stored) {
            if let Some(previous) = inner.versions.get_mut(&id) {
                previous.next = Some(new_id);
            }
        }
        Ok(stored)
    }

    /// Deletes a document by full id or by its last path segment.
    pub fn delete(&self, key: &str) -> ServerResult<String> {
        let mut inner = self.inner.write();
        let id = if inner.versions.contains_key(key) {
            key.to_string()
        } else {
            self.config.id_for(key)
        };
        match inner.versions.get_mut(&id) {
            Some(version) if !version.deleted => {
                version.deleted = true;
                Ok(id)
            }
            _ => Err(ServerError::NotFound(key.to_string())),
        }
    }

    /// Returns a live version by id.
    pub fn get(&self, id: &str) -> Option<Value> {
        let inner = self.inner.read();
        inner
            .versions
            .get(id)
            .filter(|v| !v.deleted)
            .map(|v| self.render(id, v))
    }

    /// Returns the ids of a document's history, oldest first, ending at `id`.
    pub fn history(&self, id: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut chain = Vec::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            cursor = inner
                .versions
                .get(&current)
                .and_then(|v| v.previous.clone());
            chain.push(current);
        }
        chain.reverse();
        chain
    }

    /// Runs a query; every predicate must hold.
    ///
    /// Besides plain equality on top-level keys, two history predicates are
    /// understood: `{"historyNextExists": bool}` and RERUM's
    /// `{"__rerum.history.next": {"$exists": true, "$size": 0}}`.
    pub fn query(&self, query: &Value) -> ServerResult<Vec<Value>> {
        let predicates = query
            .as_object()
            .ok_or_else(|| ServerError::InvalidRequest("query must be an object".into()))?;

        let inner = self.inner.read();
        let mut results = Vec::new();
        for id in &inner.order {
            let Some(version) = inner.versions.get(id) else {
                continue;
            };
            if version.deleted {
                continue;
            }
            if predicates
                .iter()
                .all(|(key, expected)| self.holds(id, version, key, expected))
            {
                results.push(self.render(id, version));
            }
        }
        Ok(results)
    }

    /// Number of live documents (every version counts).
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .versions
            .values()
            .filter(|v| !v.deleted)
            .count()
    }

    /// Returns true if no live document exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live, non-superseded documents.
    pub fn tip_count(&self) -> usize {
        self.inner
            .read()
            .versions
            .values()
            .filter(|v| v.is_tip())
            .count()
    }

    fn holds(&self, id: &str, version: &Version, key: &str, expected: &Value) -> bool {
        match key {
            HISTORY_NEXT_EXISTS_KEY => expected.as_bool() == Some(version.next.is_some()),
            RERUM_HISTORY_NEXT_KEY => {
                let size = expected.get("$size").and_then(Value::as_u64);
                let count = u64::from(version.next.is_some());
                size.map_or(true, |size| size == count)
            }
            _ if key == self.config.id_convention.field() => expected.as_str() == Some(id),
            _ => version.fields.get(key) == Some(expected),
        }
    }

    fn insert(&self, inner: &mut Inner, fields: Map<String, Value>, previous: Option<String>) -> Value {
        let id = self.config.id_for(&Uuid::new_v4().simple().to_string());
        let version = Version {
            fields,
            previous,
            next: None,
            deleted: false,
        };
        let rendered = self.render(&id, &version);
        inner.order.push(id.clone());
        inner.versions.insert(id, version);
        rendered
    }

    fn render(&self, id: &str, version: &Version) -> Value {
        let mut map = version.fields.clone();
        map.insert(
            self.config.id_convention.field().into(),
            Value::String(id.to_string()),
        );
        Value::Object(map)
    }

    fn id_in(&self, map: &Map<String, Value>) -> Option<String> {
        self.config
            .id_convention
            .resolve(map)
            .map(|id| id.to_string())
    }

    fn id_in_value(&self, value: &Value) -> Option<String> {
        value.as_object().and_then(|map| self.id_in(map))
    }

    fn strip_ids(&self, document: Value) -> ServerResult<Map<String, Value>> {
        let mut map = as_object(document)?;
        map.remove(self.config.id_convention.field());
        map.remove(self.config.id_convention.alternate());
        Ok(map)
    }
}

fn as_object(document: Value) -> ServerResult<Map<String, Value>> {
    match document {
        Value::Object(map) => Ok(map),
        _ => Err(ServerError::InvalidRequest("document must be an object".into())),
    }
}
