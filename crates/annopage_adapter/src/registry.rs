//! Per-canvas adapter registry.

use crate::adapter::AnnotationAdapter;
use crate::config::AdapterConfig;
use crate::transport::DocumentStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Hands out exactly one adapter per canvas.
///
/// Since each adapter serializes its own mutations, routing every caller of
/// a canvas through the same adapter makes the registry a single-flight queue
/// keyed by canvas id. Adapters of different canvases run independently.
pub struct AdapterRegistry<S: DocumentStore> {
    store: Arc<S>,
    config: AdapterConfig,
    adapters: RwLock<HashMap<String, Arc<AnnotationAdapter<Arc<S>>>>>,
}

impl<S: DocumentStore> AdapterRegistry<S> {
    /// Creates an empty registry sharing one store.
    pub fn new(store: S, config: AdapterConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the adapter of a canvas, creating it on first use.
    pub fn adapter(&self, canvas_id: &str) -> Arc<AnnotationAdapter<Arc<S>>> {
        if let Some(adapter) = self.adapters.read().get(canvas_id) {
            return adapter.clone();
        }

        let mut adapters = self.adapters.write();
        adapters
            .entry(canvas_id.to_string())
            .or_insert_with(|| {
                debug!(canvas_id, "adapter created");
                Arc::new(AnnotationAdapter::new(
                    canvas_id,
                    self.store.clone(),
                    self.config.clone(),
                ))
            })
            .clone()
    }

    /// Returns true if the canvas has an adapter.
    pub fn contains(&self, canvas_id: &str) -> bool {
        self.adapters.read().contains_key(canvas_id)
    }

    /// Returns the number of adapters.
    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    /// Returns true if no adapter has been created.
    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    /// Drops the adapter of a canvas. Callers holding it keep a working copy.
    pub fn evict(&self, canvas_id: &str) -> bool {
        self.adapters.write().remove(canvas_id).is_some()
    }

    /// Returns the canvas ids with an adapter, sorted.
    pub fn canvas_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
