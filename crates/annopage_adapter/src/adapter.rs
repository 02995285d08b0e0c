//! CRUD orchestration over the page cache.

use crate::cache::{CacheState, PageCache, PendingWrite};
use crate::config::{AdapterConfig, CachePolicy};
use crate::error::{AdapterError, AdapterResult};
use crate::outcome::Outcome;
use crate::sync::RemoteSync;
use crate::transport::DocumentStore;
use annopage_protocol::{Annotation, AnnotationPage, DocumentId};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

const CREATOR_KEY: &str = "creator";

/// Statistics about adapter operations.
#[derive(Debug, Clone, Default)]
pub struct AdapterStats {
    /// Page queries sent to the store.
    pub queries: u64,
    /// `all()` calls answered from the cache.
    pub cache_hits: u64,
    /// Annotations persisted by `create`.
    pub annotations_created: u64,
    /// Annotation versions persisted by `update`.
    pub annotations_updated: u64,
    /// Annotations removed from the store by `delete`.
    pub annotations_deleted: u64,
    /// Page versions written.
    pub pages_written: u64,
    /// Remote failures absorbed.
    pub failures: u64,
    /// Last remote failure.
    pub last_error: Option<String>,
}

/// Storage adapter for the annotation page of one canvas.
///
/// Mutations hold the gate exclusively, so on one adapter they run one at a
/// time in arrival order; reads share it. Nothing is transactional across
/// the network: if two adapters write the same canvas, the last page version
/// written is the one the store keeps.
pub struct AnnotationAdapter<S: DocumentStore> {
    canvas_id: String,
    config: AdapterConfig,
    remote: RemoteSync<S>,
    cache: PageCache,
    gate: tokio::sync::RwLock<()>,
    stats: RwLock<AdapterStats>,
}

impl<S: DocumentStore> AnnotationAdapter<S> {
    /// Creates an adapter for a canvas. No request is made until first use.
    pub fn new(canvas_id: impl Into<String>, store: S, config: AdapterConfig) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            remote: RemoteSync::new(store, &config),
            config,
            cache: PageCache::new(),
            gate: tokio::sync::RwLock::new(()),
            stats: RwLock::new(AdapterStats::default()),
        }
    }

    /// Returns the canvas this adapter serves.
    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        self.remote.store()
    }

    /// Gets the cache state.
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Returns the id of the cached page, if it is persisted.
    pub fn annotation_page_id(&self) -> Option<DocumentId> {
        self.cache.page().and_then(|page| page.id().cloned())
    }

    /// Gets the current stats.
    pub fn stats(&self) -> AdapterStats {
        self.stats.read().clone()
    }

    /// Drops the cached page; the next read queries the store.
    pub async fn invalidate(&self) {
        let _write = self.gate.write().await;
        if let Err(err) = self.cache.invalidate() {
            warn!(canvas_id = %self.canvas_id, error = %err, "invalidate skipped");
        }
    }

    /// Returns the current page of the canvas.
    ///
    /// Under [`CachePolicy::CacheFirst`] a warm cache answers without a
    /// request. On failure the last known page (or an empty stub) is returned.
    pub async fn all(&self) -> Outcome<AnnotationPage> {
        let _read = self.gate.read().await;
        if self.config.cache_policy == CachePolicy::CacheFirst {
            if let Some(page) = self.cache.warm_page() {
                self.stats.write().cache_hits += 1;
                return Outcome::Applied(page);
            }
        }
        match self.load().await {
            Ok(page) => Outcome::Applied(page),
            Err(err) => self.unchanged(self.fallback_page(), err),
        }
    }

    /// Looks up one annotation after refreshing the page from the store.
    pub async fn get(&self, id: &DocumentId) -> Outcome<Option<Annotation>> {
        if id.as_str().is_empty() {
            return Outcome::Unchanged(None, AdapterError::MissingIdentifier);
        }
        let _read = self.gate.read().await;
        match self.load().await {
            Ok(page) => Outcome::Applied(page.find(id).cloned()),
            Err(err) => {
                let cached = self.cache.page().and_then(|page| page.find(id).cloned());
                self.unchanged(cached, err)
            }
        }
    }

    /// Persists a new annotation and appends it to the page.
    pub async fn create(&self, annotation: Annotation) -> Outcome<AnnotationPage> {
        let _write = self.gate.write().await;
        if let Err(err) = self.ensure_warm().await {
            return self.unchanged(self.fallback_page(), err);
        }
        let write = match self.cache.begin_write() {
            Ok(write) => write,
            Err(err) => return self.unchanged(self.fallback_page(), err),
        };

        let annotation = self.stamp_annotation(annotation);
        let created = self.remote.create_document(&annotation).await;
        let stored = match created.into_result() {
            Ok(stored) => stored,
            Err(err) => return self.abandon(write, err),
        };
        self.stats.write().annotations_created += 1;

        let next = write.page().with_item_appended(stored);
        self.persist_page(write, next).await
    }

    /// Decodes a JSON annotation and creates it.
    ///
    /// Anything other than a JSON object leaves the page unchanged.
    pub async fn create_json(&self, value: Value) -> Outcome<AnnotationPage> {
        match self.remote.format().decode_annotation(value) {
            Ok(annotation) => self.create(annotation).await,
            Err(err) => {
                let _write = self.gate.write().await;
                if let Err(err) = self.ensure_warm().await {
                    return self.unchanged(self.fallback_page(), err);
                }
                self.unchanged(
                    self.fallback_page(),
                    AdapterError::InvalidDocument(err.to_string()),
                )
            }
        }
    }

    /// Persists a new version of an annotation and replaces it on the page.
    ///
    /// The item is matched by the id `annotation` carries on entry; it is
    /// replaced by the store's response, which carries the new version's id.
    pub async fn update(&self, annotation: Annotation) -> Outcome<AnnotationPage> {
        let _write = self.gate.write().await;
        if let Err(err) = self.ensure_warm().await {
            return self.unchanged(self.fallback_page(), err);
        }
        let Some(original) = annotation.id().cloned() else {
            return self.unchanged(self.fallback_page(), AdapterError::MissingIdentifier);
        };
        let write = match self.cache.begin_write() {
            Ok(write) => write,
            Err(err) => return self.unchanged(self.fallback_page(), err),
        };

        let updated = self.remote.update_document(&annotation).await;
        let stored = match updated.into_result() {
            Ok(stored) => stored,
            Err(err) => return self.abandon(write, err),
        };
        self.stats.write().annotations_updated += 1;

        let Some(index) = write.page().position(&original) else {
            return self.abandon(write, AdapterError::ItemNotFound(original));
        };
        let next = write.page().with_item_replaced(index, stored);
        self.persist_page(write, next).await
    }

    /// Deletes an annotation from the store and removes it from the page.
    pub async fn delete(&self, id: &DocumentId) -> Outcome<AnnotationPage> {
        if id.as_str().is_empty() {
            return self.unchanged(self.fallback_page(), AdapterError::MissingIdentifier);
        }
        let _write = self.gate.write().await;
        if let Err(err) = self.ensure_warm().await {
            return self.unchanged(self.fallback_page(), err);
        }
        let write = match self.cache.begin_write() {
            Ok(write) => write,
            Err(err) => return self.unchanged(self.fallback_page(), err),
        };

        let deleted = self.remote.delete_document(id).await;
        if let Some(err) = deleted.error {
            // The document may or may not be gone; a later `all()` reconciles.
            return self.abandon(write, err);
        }
        self.stats.write().annotations_deleted += 1;

        let Some(index) = write.page().position(id) else {
            return self.abandon(write, AdapterError::ItemNotFound(id.clone()));
        };
        let next = write.page().with_item_removed(index);
        self.persist_page(write, next).await
    }

    async fn load(&self) -> AdapterResult<AnnotationPage> {
        self.stats.write().queries += 1;
        let queried = self.remote.query_current_page(&self.canvas_id).await;
        match queried.into_result()? {
            Some(page) => {
                let state = self.cache.fill(page.clone())?;
                debug!(canvas_id = %self.canvas_id, %state, "page cache filled");
                Ok(page)
            }
            None => Err(AdapterError::Protocol("page query returned no value".into())),
        }
    }

    async fn ensure_warm(&self) -> AdapterResult<()> {
        if self.cache.state().is_warm() {
            return Ok(());
        }
        self.load().await.map(|_| ())
    }

    /// Writes the next page version: update if the page is persisted, create
    /// on the first write for this canvas.
    async fn persist_page(
        &self,
        write: PendingWrite<'_>,
        next: AnnotationPage,
    ) -> Outcome<AnnotationPage> {
        let written = if next.is_persisted() {
            self.remote.update_document(&next).await
        } else {
            self.remote.create_document(&self.stamp_page(next)).await
        };

        match written.into_result() {
            Ok(stored) => {
                if let Err(err) = write.commit(stored.clone()) {
                    warn!(canvas_id = %self.canvas_id, error = %err, "page commit rejected");
                }
                self.stats.write().pages_written += 1;
                debug!(
                    canvas_id = %self.canvas_id,
                    page_id = ?stored.id(),
                    items = stored.len(),
                    "page written"
                );
                Outcome::Applied(stored)
            }
            Err(err) => {
                let before = write.page().clone();
                write.abort();
                self.record_failure(&err);
                warn!(
                    canvas_id = %self.canvas_id,
                    error = %err,
                    "annotation persisted but page write failed"
                );
                Outcome::Partial(before, err)
            }
        }
    }

    fn abandon(&self, write: PendingWrite<'_>, err: AdapterError) -> Outcome<AnnotationPage> {
        let before = write.page().clone();
        write.abort();
        self.unchanged(before, err)
    }

    fn unchanged<T>(&self, value: T, err: AdapterError) -> Outcome<T> {
        if err.is_remote_failure() {
            self.record_failure(&err);
        } else {
            debug!(canvas_id = %self.canvas_id, reason = %err, "nothing changed");
        }
        Outcome::Unchanged(value, err)
    }

    fn record_failure(&self, err: &AdapterError) {
        let mut stats = self.stats.write();
        stats.failures += 1;
        stats.last_error = Some(err.to_string());
    }

    fn fallback_page(&self) -> AnnotationPage {
        self.cache
            .page()
            .unwrap_or_else(|| self.remote.format().empty_page(&self.canvas_id))
    }

    fn stamp_annotation(&self, annotation: Annotation) -> Annotation {
        match self.config.creator.tag() {
            Some(tag) if annotation.get(CREATOR_KEY).is_none() => {
                annotation.with_field(CREATOR_KEY, Value::String(tag.to_string()))
            }
            _ => annotation,
        }
    }

    fn stamp_page(&self, page: AnnotationPage) -> AnnotationPage {
        match self.config.creator.tag() {
            Some(tag) if page.creator().is_none() => page.with_creator(tag),
            _ => page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreatorPolicy;
    use crate::transport::{MockOperation, MockStore};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> AdapterConfig {
        AdapterConfig::new("mock://")
    }

    fn adapter() -> AnnotationAdapter<MockStore> {
        AnnotationAdapter::new("C1", MockStore::new(), config())
    }

    fn note(text: &str) -> Annotation {
        Annotation::from_json(json!({"type": "Annotation", "text": text}), Default::default())
            .unwrap()
    }

    async fn seeded(n: usize) -> AnnotationAdapter<MockStore> {
        let adapter = adapter();
        for i in 0..n {
            adapter.create(note(&format!("note {}", i))).await.into_result().unwrap();
        }
        adapter
    }

    fn ids(page: &AnnotationPage) -> Vec<String> {
        page.items()
            .iter()
            .map(|a| a.id().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn all_twice_returns_same_items() {
        let adapter = seeded(2).await;
        adapter.invalidate().await;

        let first = adapter.all().await.into_result().unwrap();
        let second = adapter.all().await.into_result().unwrap();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(adapter.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn all_revalidates_when_configured() {
        let store = Arc::new(MockStore::new());
        let adapter = AnnotationAdapter::new(
            "C1",
            store.clone(),
            config().with_cache_policy(CachePolicy::AlwaysRevalidate),
        );

        let first = adapter.all().await.into_result().unwrap();
        let second = adapter.all().await.into_result().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn create_then_get_returns_stored_item() {
        let adapter = adapter();
        let page = adapter.create(note("hello")).await.into_result().unwrap();
        let stored = page.items()[0].clone();
        let id = stored.id().cloned().unwrap();

        let found = adapter.get(&id).await.into_result().unwrap();
        assert_eq!(found, Some(stored));
        let missing = adapter.get(&DocumentId::new("nope")).await.into_result().unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn first_create_persists_page() {
        let adapter = adapter();
        assert_eq!(adapter.cache_state(), CacheState::Unloaded);

        let page = adapter.create(note("first")).await.into_result().unwrap();
        assert!(page.is_persisted());
        assert_eq!(page.target(), "C1");
        assert_eq!(page.len(), 1);
        assert_eq!(adapter.cache_state(), CacheState::Loaded);
        assert_eq!(adapter.annotation_page_id().as_ref(), page.id());

        adapter.invalidate().await;
        let queried = adapter.all().await.into_result().unwrap();
        assert_eq!(queried.id(), page.id());
        assert_eq!(queried.len(), 1);
    }

    #[tokio::test]
    async fn get_queries_even_when_warm() {
        let store = Arc::new(MockStore::new());
        let reader = AnnotationAdapter::new("C1", store.clone(), config());
        let writer = AnnotationAdapter::new("C1", store.clone(), config());

        reader.create(note("mine")).await.into_result().unwrap();
        assert_eq!(reader.cache_state(), CacheState::Loaded);

        let page = writer.create(note("theirs")).await.into_result().unwrap();
        let theirs = page.items()[1].clone();
        let queries = store.query_count();

        let found = reader.get(theirs.id().unwrap()).await.into_result().unwrap();
        assert_eq!(found, Some(theirs));
        assert_eq!(store.query_count(), queries + 1);
        assert_eq!(reader.annotation_page_id().as_ref(), page.id());
    }

    #[tokio::test]
    async fn cancelled_create_leaves_adapter_usable() {
        let adapter = seeded(1).await;
        let before = adapter.all().await.into_value();
        adapter.store().set_delay(Some(Duration::from_millis(200)));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), adapter.create(note("dropped"))).await;
        assert!(cancelled.is_err());
        adapter.store().set_delay(None);

        assert_eq!(adapter.cache_state(), CacheState::Loaded);
        assert_eq!(adapter.all().await.into_result().unwrap(), before);

        let page = adapter.create(note("kept")).await.into_result().unwrap();
        assert_eq!(page.len(), 2);

        adapter.invalidate().await;
        assert_eq!(adapter.cache_state(), CacheState::Unloaded);
        assert_eq!(adapter.all().await.into_result().unwrap(), page);
    }

    #[tokio::test]
    async fn update_preserves_cardinality_and_order() {
        let adapter = seeded(3).await;
        let before = adapter.all().await.into_value();
        let target = before.items()[1].clone();

        let page = adapter
            .update(target.clone().with_field("text", json!("changed")))
            .await
            .into_result()
            .unwrap();

        assert_eq!(page.len(), 3);
        assert_ne!(page.id(), before.id());
        assert_eq!(page.items()[0], before.items()[0]);
        assert_eq!(page.items()[2], before.items()[2]);
        assert_eq!(page.items()[1].get("text"), Some(&json!("changed")));
        assert!(page.find(target.id().unwrap()).is_none());
    }

    #[tokio::test]
    async fn update_without_id_is_a_no_op() {
        let adapter = seeded(1).await;
        let writes = adapter.store().write_count();

        let outcome = adapter.update(note("no id")).await;
        assert!(matches!(outcome.error(), Some(AdapterError::MissingIdentifier)));
        assert_eq!(outcome.value().len(), 1);
        assert_eq!(adapter.store().write_count(), writes);
    }

    #[tokio::test]
    async fn update_of_unknown_item_reports_not_found() {
        let adapter = seeded(1).await;
        let before = adapter.all().await.into_value();

        let outcome = adapter.update(note("stranger").with_id("elsewhere")).await;
        // The store has no such document either.
        assert!(matches!(outcome.error(), Some(AdapterError::Status { status: 404, .. })));
        assert_eq!(outcome.value(), &before);

        let other = adapter.store().seed(json!({"text": "other canvas"}));
        let outcome = adapter.update(note("moved").with_id(other.clone())).await;
        assert!(matches!(outcome.error(), Some(AdapterError::ItemNotFound(id)) if *id == other));
        assert_eq!(outcome.value(), &before);
        assert_eq!(adapter.cache_state(), CacheState::Loaded);
    }

    #[tokio::test]
    async fn delete_removes_only_the_item() {
        let adapter = seeded(3).await;
        let before = adapter.all().await.into_value();
        let victim = before.items()[1].id().cloned().unwrap();

        let page = adapter.delete(&victim).await.into_result().unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.find(&victim).is_none());
        assert_eq!(page.items()[0], before.items()[0]);
        assert_eq!(page.items()[1], before.items()[2]);
    }

    #[tokio::test]
    async fn delete_of_missing_item_is_a_no_op() {
        let adapter = seeded(2).await;
        let before = adapter.all().await.into_value();

        let outcome = adapter.delete(&DocumentId::new("mock:999")).await;
        assert!(!outcome.is_applied());
        assert_eq!(outcome.value(), &before);

        let outcome = adapter.delete(&DocumentId::new("")).await;
        assert!(matches!(outcome.error(), Some(AdapterError::MissingIdentifier)));
        assert_eq!(outcome.value().len(), 2);
    }

    #[tokio::test]
    async fn canvas_scenario() {
        let adapter = adapter();

        let page = adapter.create(note("hello")).await.into_result().unwrap();
        assert_eq!(page.target(), "C1");
        assert_eq!(page.len(), 1);
        let first_page = page.id().cloned();
        let item = page.items()[0].clone();
        assert_eq!(item.get("text"), Some(&json!("hello")));

        let page = adapter
            .update(item.with_field("text", json!("hello!")))
            .await
            .into_result()
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_ne!(page.id().cloned(), first_page);
        assert_eq!(page.items()[0].get("text"), Some(&json!("hello!")));

        let id = page.items()[0].id().cloned().unwrap();
        let page = adapter.delete(&id).await.into_result().unwrap();
        assert!(page.is_empty());
        assert!(page.is_persisted());
    }

    #[tokio::test]
    async fn create_failure_leaves_cache_untouched() {
        let adapter = seeded(1).await;
        let before = adapter.all().await.into_value();
        adapter.store().fail_next(MockOperation::Create);

        let outcome = adapter.create(note("lost")).await;
        assert!(matches!(outcome, Outcome::Unchanged(_, AdapterError::Transport { .. })));
        assert_eq!(outcome.value(), &before);
        assert_eq!(adapter.cache_state(), CacheState::Loaded);
        assert_eq!(adapter.all().await.into_value(), before);
        assert_eq!(adapter.stats().failures, 1);
    }

    #[tokio::test]
    async fn page_write_failure_is_partial() {
        let adapter = seeded(1).await;
        let before = adapter.all().await.into_value();
        adapter.store().fail_next(MockOperation::Update);

        let outcome = adapter.create(note("orphan")).await;
        assert!(outcome.is_partial());
        assert_eq!(outcome.value(), &before);
        assert_eq!(adapter.all().await.into_value(), before);
    }

    #[tokio::test]
    async fn query_failure_returns_stub() {
        let adapter = adapter();
        adapter.store().set_connected(false);

        let outcome = adapter.all().await;
        assert!(outcome.error().unwrap().is_remote_failure());
        assert!(outcome.value().is_empty());
        assert!(!outcome.value().is_persisted());
        assert_eq!(adapter.cache_state(), CacheState::Unloaded);

        let outcome = adapter.create(note("offline")).await;
        assert!(!outcome.is_applied());
        assert_eq!(adapter.store().write_count(), 0);
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let adapter = AnnotationAdapter::new(
            "C1",
            MockStore::new(),
            config().with_timeout(Duration::from_millis(20)),
        );
        adapter.store().set_delay(Some(Duration::from_millis(200)));

        let outcome = adapter.all().await;
        assert!(matches!(
            outcome.error(),
            Some(AdapterError::TransportTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let adapter = adapter();
        let outcome = adapter.create_json(Value::Null).await;
        assert!(matches!(outcome.error(), Some(AdapterError::InvalidDocument(_))));
        assert!(outcome.value().is_empty());
        assert_eq!(adapter.store().write_count(), 0);

        let page = adapter
            .create_json(json!({"type": "Annotation", "text": "ok"}))
            .await
            .into_result()
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn creator_tag_is_stamped() {
        let adapter = AnnotationAdapter::new(
            "C1",
            MockStore::new(),
            config().with_creator(CreatorPolicy::Tag("tester".into())),
        );

        let page = adapter.create(note("tagged")).await.into_result().unwrap();
        assert_eq!(page.creator(), Some("tester"));
        assert_eq!(page.items()[0].get("creator"), Some(&json!("tester")));
    }

    #[tokio::test]
    async fn concurrent_creates_are_serialized() {
        let adapter = Arc::new(adapter());
        let mut handles = Vec::new();
        for i in 0..8 {
            let adapter = adapter.clone();
            handles.push(tokio::spawn(async move {
                adapter.create(note(&format!("n{}", i))).await.is_applied()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        adapter.invalidate().await;
        let page = adapter.all().await.into_result().unwrap();
        assert_eq!(page.len(), 8);
    }
}
