//! Host viewer integration.
//!
//! The viewer owns rendering and its own state. It hands the adapter layer a
//! sink to publish pages into, and reports which canvases are on screen.

use crate::registry::AdapterRegistry;
use crate::transport::DocumentStore;
use annopage_protocol::{AnnotationPage, DocumentId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Receives freshly loaded pages on behalf of the host viewer.
pub trait AnnotationSink: Send + Sync {
    /// Publishes the page of a canvas. `page_id` is `None` while the canvas
    /// has no stored page yet.
    fn receive_annotation(&self, canvas_id: &str, page_id: Option<&DocumentId>, page: &AnnotationPage);
}

/// Re-fetches pages when the set of visible canvases changes.
pub struct CanvasWatcher<S: DocumentStore, K: AnnotationSink> {
    registry: Arc<AdapterRegistry<S>>,
    sink: K,
    visible: Mutex<Vec<String>>,
}

impl<S: DocumentStore, K: AnnotationSink> CanvasWatcher<S, K> {
    /// Creates a watcher with no visible canvases.
    pub fn new(registry: Arc<AdapterRegistry<S>>, sink: K) -> Self {
        Self {
            registry,
            sink,
            visible: Mutex::new(Vec::new()),
        }
    }

    /// Returns the sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<AdapterRegistry<S>> {
        &self.registry
    }

    /// Returns the canvases last reported visible.
    pub fn visible(&self) -> Vec<String> {
        self.visible.lock().clone()
    }

    /// Handles a canvas-list notification.
    ///
    /// The list is compared in order; an identical list fetches nothing.
    /// Returns the number of pages published.
    pub async fn canvases_changed(&self, canvas_ids: Vec<String>) -> usize {
        {
            let mut visible = self.visible.lock();
            if *visible == canvas_ids {
                return 0;
            }
            *visible = canvas_ids.clone();
        }
        self.publish(&canvas_ids).await
    }

    /// Re-publishes every visible canvas.
    pub async fn refresh(&self) -> usize {
        let canvas_ids = self.visible();
        self.publish(&canvas_ids).await
    }

    async fn publish(&self, canvas_ids: &[String]) -> usize {
        let mut published = 0;
        for canvas_id in canvas_ids {
            let adapter = self.registry.adapter(canvas_id);
            let outcome = adapter.all().await;
            match outcome.error() {
                None => {
                    let page = outcome.value();
                    info!(%canvas_id, items = page.len(), "publishing annotation page");
                    self.sink.receive_annotation(canvas_id, page.id(), page);
                    published += 1;
                }
                Some(err) => {
                    warn!(%canvas_id, error = %err, "annotation page unavailable");
                }
            }
        }
        published
    }
}
