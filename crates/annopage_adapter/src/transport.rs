//! Transport layer abstraction for the versioned document store.

use crate::error::{AdapterError, AdapterResult};
use annopage_protocol::{
    DocumentId, IdConvention, HISTORY_NEXT_EXISTS_KEY, RERUM_HISTORY_NEXT_KEY,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A versioned document store.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory mock for testing, etc.). Documents cross
/// this boundary as raw JSON; decoding happens one layer up.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Runs a structured query, returning every matching document.
    async fn query(&self, query: &Value) -> AdapterResult<Vec<Value>>;

    /// Persists a new document, returning it with its assigned id.
    async fn create(&self, document: &Value) -> AdapterResult<Value>;

    /// Persists a new version of an existing document, returning it with its new id.
    async fn update(&self, document: &Value) -> AdapterResult<Value>;

    /// Deletes a document.
    async fn delete(&self, id: &DocumentId) -> AdapterResult<()>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn query(&self, query: &Value) -> AdapterResult<Vec<Value>> {
        (**self).query(query).await
    }

    async fn create(&self, document: &Value) -> AdapterResult<Value> {
        (**self).create(document).await
    }

    async fn update(&self, document: &Value) -> AdapterResult<Value> {
        (**self).update(document).await
    }

    async fn delete(&self, id: &DocumentId) -> AdapterResult<()> {
        (**self).delete(id).await
    }
}

/// A store primitive, used to inject failures into [`MockStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOperation {
    /// `query`.
    Query,
    /// `create`.
    Create,
    /// `update`.
    Update,
    /// `delete`.
    Delete,
}

#[derive(Debug, Clone)]
struct MockRecord {
    id: String,
    document: Value,
    superseded: bool,
    deleted: bool,
}

/// An in-memory versioned store for testing.
///
/// Every create and update assigns a fresh `mock:{n}` id; updates mark the
/// previous version superseded so only history tips answer tip queries.
#[derive(Debug)]
pub struct MockStore {
    convention: IdConvention,
    connected: AtomicBool,
    records: Mutex<Vec<MockRecord>>,
    failures: Mutex<Vec<MockOperation>>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicU64,
    queries: AtomicU64,
    writes: AtomicU64,
}

impl MockStore {
    /// Creates an empty mock store writing plain `id` keys.
    pub fn new() -> Self {
        Self::with_convention(IdConvention::Plain)
    }

    /// Creates an empty mock store writing ids under the given key.
    pub fn with_convention(convention: IdConvention) -> Self {
        Self {
            convention,
            connected: AtomicBool::new(true),
            records: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            next_id: AtomicU64::new(1),
            queries: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Sets the connected state; a disconnected store fails every call.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes the next call of `operation` fail with a transport error.
    pub fn fail_next(&self, operation: MockOperation) {
        self.failures.lock().push(operation);
    }

    /// Delays every call, for timeout tests.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Seeds a document as if it had been created, returning its id.
    pub fn seed(&self, document: Value) -> DocumentId {
        let stored = self.insert(document);
        DocumentId::new(self.id_of(&stored).unwrap_or_default())
    }

    /// Returns the current version of a document.
    pub fn current(&self, id: &DocumentId) -> Option<Value> {
        self.records
            .lock()
            .iter()
            .find(|r| r.id == id.as_str() && !r.deleted)
            .map(|r| r.document.clone())
    }

    /// Returns true if the id names a live, non-superseded document.
    pub fn is_tip(&self, id: &DocumentId) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.id == id.as_str() && !r.deleted && !r.superseded)
    }

    /// Number of queries served.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of create, update and delete calls served.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: MockOperation) -> AdapterResult<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(AdapterError::transport_retryable("store unreachable"));
        }
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|op| *op == operation) {
            failures.remove(pos);
            return Err(AdapterError::transport_retryable(format!(
                "injected {:?} failure",
                operation
            )));
        }
        Ok(())
    }

    fn id_of(&self, document: &Value) -> Option<String> {
        document
            .as_object()
            .and_then(|map| self.convention.resolve(map))
            .map(|id| id.to_string())
    }

    fn insert(&self, document: Value) -> Value {
        let id = format!("mock:{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut document = document;
        if let Value::Object(ref mut map) = document {
            map.remove(self.convention.alternate());
            map.insert(self.convention.field().into(), Value::String(id.clone()));
        }
        self.records.lock().push(MockRecord {
            id,
            document: document.clone(),
            superseded: false,
            deleted: false,
        });
        document
    }

    fn matches(record: &MockRecord, query: &Value) -> bool {
        if record.deleted {
            return false;
        }
        let Some(predicates) = query.as_object() else {
            return false;
        };
        predicates.iter().all(|(key, expected)| {
            if key == HISTORY_NEXT_EXISTS_KEY || key == RERUM_HISTORY_NEXT_KEY {
                !record.superseded
            } else {
                record.document.get(key) == Some(expected)
            }
        })
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn query(&self, query: &Value) -> AdapterResult<Vec<Value>> {
        self.enter(MockOperation::Query).await?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| Self::matches(r, query))
            .map(|r| r.document.clone())
            .collect())
    }

    async fn create(&self, document: &Value) -> AdapterResult<Value> {
        self.enter(MockOperation::Create).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if !document.is_object() {
            return Err(AdapterError::Status {
                status: 400,
                message: "document must be an object".into(),
            });
        }
        Ok(self.insert(document.clone()))
    }

    async fn update(&self, document: &Value) -> AdapterResult<Value> {
        self.enter(MockOperation::Update).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let id = self.id_of(document).ok_or_else(|| AdapterError::Status {
            status: 400,
            message: "update requires an id".into(),
        })?;
        {
            let mut records = self.records.lock();
            let record = records
                .iter_mut()
                .find(|r| r.id == id && !r.deleted)
                .ok_or_else(|| AdapterError::Status {
                    status: 404,
                    message: format!("no document {}", id),
                })?;
            if record.superseded {
                return Err(AdapterError::Status {
                    status: 409,
                    message: format!("{} is not the current version", id),
                });
            }
            record.superseded = true;
        }
        Ok(self.insert(document.clone()))
    }

    async fn delete(&self, id: &DocumentId) -> AdapterResult<()> {
        self.enter(MockOperation::Delete).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| !r.deleted && (r.id == id.as_str() || r.id.ends_with(&format!(":{}", id.slug()))))
            .ok_or_else(|| AdapterError::Status {
                status: 404,
                message: format!("no document {}", id),
            })?;
        record.deleted = true;
        Ok(())
    }
}
