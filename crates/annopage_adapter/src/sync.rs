//! Remote sync primitives.
//!
//! The four primitives never return a bare error. Each yields a [`Fallback`]:
//! the store's authoritative answer on success, or the best value known
//! before the call together with the error that forced the fallback.

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::transport::DocumentStore;
use annopage_protocol::{
    Annotation, AnnotationPage, DocumentFormat, DocumentId, HistoryTip, PageQuery, ProtocolResult,
};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A value that is either the store's answer or a fallback.
#[derive(Debug, Clone)]
pub struct Fallback<T> {
    /// The store's answer, or the fallback value.
    pub value: T,
    /// Why the fallback was used.
    pub error: Option<AdapterError>,
}

impl<T> Fallback<T> {
    /// The store answered.
    pub fn ok(value: T) -> Self {
        Self { value, error: None }
    }

    /// The store did not answer; `value` is the best known state.
    pub fn failed(value: T, error: AdapterError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    /// Returns true if the store answered.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into a `Result`, dropping the fallback value on error.
    pub fn into_result(self) -> AdapterResult<T> {
        match self.error {
            None => Ok(self.value),
            Some(err) => Err(err),
        }
    }
}

/// A document kind the store can persist.
pub trait StoreDocument: Clone + Send + Sync {
    /// Human-readable kind, used in errors and logs.
    const KIND: &'static str;

    /// Returns the store-assigned id, if any.
    fn document_id(&self) -> Option<&DocumentId>;

    /// Encodes for the wire.
    fn encode(&self, format: &DocumentFormat) -> Value;

    /// Decodes a store response.
    fn decode(format: &DocumentFormat, value: Value) -> ProtocolResult<Self>;
}

impl StoreDocument for Annotation {
    const KIND: &'static str = "annotation";

    fn document_id(&self) -> Option<&DocumentId> {
        self.id()
    }

    fn encode(&self, format: &DocumentFormat) -> Value {
        format.encode_annotation(self)
    }

    fn decode(format: &DocumentFormat, value: Value) -> ProtocolResult<Self> {
        format.decode_annotation(value)
    }
}

impl StoreDocument for AnnotationPage {
    const KIND: &'static str = "annotation page";

    fn document_id(&self) -> Option<&DocumentId> {
        self.id()
    }

    fn encode(&self, format: &DocumentFormat) -> Value {
        format.encode_page(self)
    }

    fn decode(format: &DocumentFormat, value: Value) -> ProtocolResult<Self> {
        format.decode_page(value)
    }
}

/// Sync primitives over a [`DocumentStore`].
pub struct RemoteSync<S: DocumentStore> {
    store: S,
    format: DocumentFormat,
    history_tip: HistoryTip,
    timeout: Duration,
}

impl<S: DocumentStore> RemoteSync<S> {
    /// Creates the primitives for a store.
    pub fn new(store: S, config: &AdapterConfig) -> Self {
        Self {
            store,
            format: config.format.clone(),
            history_tip: config.history_tip,
            timeout: config.timeout,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the document format.
    pub fn format(&self) -> &DocumentFormat {
        &self.format
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = AdapterResult<T>>,
    ) -> AdapterResult<T> {
        debug!(operation, "store call");
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::TransportTimeout {
                operation,
                after: self.timeout,
            }),
        }
    }

    /// Looks up the current page of a canvas.
    ///
    /// Yields the first history tip found, or an unpersisted empty page when
    /// the store has none. On failure the value is `None`: the page is
    /// unknown, which is not the same as absent.
    pub async fn query_current_page(&self, canvas_id: &str) -> Fallback<Option<AnnotationPage>> {
        let query = PageQuery::new(canvas_id, &self.format, self.history_tip).to_json();

        let result = self
            .bounded("query", self.store.query(&query))
            .await
            .and_then(|documents| match documents.into_iter().next() {
                Some(document) => Ok(self.format.decode_page(document)?),
                None => Ok(self.format.empty_page(canvas_id)),
            });

        match result {
            Ok(page) => {
                debug!(canvas_id, page_id = ?page.id(), items = page.len(), "current page");
                Fallback::ok(Some(page))
            }
            Err(err) => {
                warn!(canvas_id, error = %err, "page query failed");
                Fallback::failed(None, err)
            }
        }
    }

    /// Persists a new document.
    ///
    /// On failure the value is `document`, unpersisted.
    pub async fn create_document<D: StoreDocument>(&self, document: &D) -> Fallback<D> {
        let body = document.encode(&self.format);
        let result = self
            .bounded("create", self.store.create(&body))
            .await
            .and_then(|response| self.decode_stored::<D>(response));

        match result {
            Ok(stored) => {
                debug!(kind = D::KIND, id = ?stored.document_id(), "document created");
                Fallback::ok(stored)
            }
            Err(err) => {
                warn!(kind = D::KIND, error = %err, "create failed");
                Fallback::failed(document.clone(), err)
            }
        }
    }

    /// Persists a new version of a document.
    ///
    /// The stored version carries a new id. On failure the value is
    /// `document` as it was before the call.
    pub async fn update_document<D: StoreDocument>(&self, document: &D) -> Fallback<D> {
        let Some(previous) = document.document_id() else {
            return Fallback::failed(document.clone(), AdapterError::NotPersisted(D::KIND));
        };

        let body = document.encode(&self.format);
        let result = self
            .bounded("update", self.store.update(&body))
            .await
            .and_then(|response| self.decode_stored::<D>(response));

        match result {
            Ok(stored) => {
                debug!(kind = D::KIND, %previous, id = ?stored.document_id(), "document updated");
                Fallback::ok(stored)
            }
            Err(err) => {
                warn!(kind = D::KIND, %previous, error = %err, "update failed");
                Fallback::failed(document.clone(), err)
            }
        }
    }

    /// Deletes a document; the value reports whether the store confirmed it.
    pub async fn delete_document(&self, id: &DocumentId) -> Fallback<bool> {
        match self.bounded("delete", self.store.delete(id)).await {
            Ok(()) => {
                debug!(%id, "document deleted");
                Fallback::ok(true)
            }
            Err(err) => {
                warn!(%id, error = %err, "delete failed");
                Fallback::failed(false, err)
            }
        }
    }

    fn decode_stored<D: StoreDocument>(&self, response: Value) -> AdapterResult<D> {
        let stored = D::decode(&self.format, response)?;
        if stored.document_id().is_none() {
            return Err(AdapterError::NotPersisted(D::KIND));
        }
        Ok(stored)
    }
}
