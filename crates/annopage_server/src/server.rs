//! Main store server.

use crate::config::StoreConfig;
use crate::handler::RequestHandler;
use crate::store::VersionedStore;
use annopage_protocol::{HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// The reference store server.
///
/// This server answers the versioned-store HTTP surface (query, create,
/// patch, update, delete) from memory. It speaks in [`HttpRequest`] and
/// [`HttpResponse`] values, so it can sit behind any HTTP front end or be
/// called in-process.
///
/// # Example
///
/// ```
/// use annopage_protocol::{HttpMethod, HttpRequest};
/// use annopage_server::{StoreConfig, StoreServer};
/// use serde_json::json;
///
/// let server = StoreServer::new(StoreConfig::default());
/// let request = HttpRequest::json(HttpMethod::Post, "/create", &json!({"n": 1})).unwrap();
/// let response = server.handle(&request);
/// assert_eq!(response.status, 201);
/// ```
pub struct StoreServer {
    handler: RequestHandler,
    store: Arc<VersionedStore>,
}

impl StoreServer {
    /// Creates a new store server.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_store(Arc::new(VersionedStore::new(config)))
    }

    /// Creates a server over an existing store.
    pub fn with_store(store: Arc<VersionedStore>) -> Self {
        let handler = RequestHandler::new(Arc::clone(&store));
        Self { handler, store }
    }

    /// Handles a request; errors become JSON error responses.
    pub fn handle(&self, request: &HttpRequest) -> HttpResponse {
        match self.handler.handle(request) {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                if err.is_server_error() {
                    warn!(method = %request.method, url = %request.url, error = %err, "request failed");
                }
                let body = json!({"error": err.to_string()});
                HttpResponse::json(status, &body)
                    .unwrap_or_else(|_| HttpResponse::new(status, err.to_string().into_bytes()))
            }
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    /// Returns the number of live documents.
    pub fn document_count(&self) -> usize {
        self.store.len()
    }
}

impl Default for StoreServer {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annopage_protocol::HttpMethod;

    #[test]
    fn server_lifecycle() {
        let server = StoreServer::default();
        assert_eq!(server.document_count(), 0);

        let request = HttpRequest::json(HttpMethod::Post, "/create", &json!({"n": 1})).unwrap();
        assert_eq!(server.handle(&request).status, 201);
        assert_eq!(server.document_count(), 1);
    }

    #[test]
    fn errors_become_json_responses() {
        let server = StoreServer::default();

        let request = HttpRequest::new(HttpMethod::Delete, "/delete/missing");
        let response = server.handle(&request);
        assert_eq!(response.status, 404);
        assert!(response.json_body().unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("missing"));

        let request = HttpRequest::json(
            HttpMethod::Patch,
            "/patch/",
            &json!({"n": 1}),
        )
        .unwrap();
        assert_eq!(server.handle(&request).status, 400);
    }

    #[test]
    fn full_version_flow() {
        let server = StoreServer::default();
        let create = HttpRequest::json(
            HttpMethod::Post,
            "/create",
            &json!({"type": "AnnotationPage", "target": "C1", "items": []}),
        )
        .unwrap();
        let v1 = server.handle(&create).json_body().unwrap();

        let put = HttpRequest::json(
            HttpMethod::Put,
            "/update",
            &json!({"id": v1["id"], "type": "AnnotationPage", "target": "C1", "items": [{"id": "A"}]}),
        )
        .unwrap();
        let v2 = server.handle(&put).json_body().unwrap();
        assert_ne!(v1["id"], v2["id"]);

        // Writing the old version again is a conflict.
        assert_eq!(server.handle(&put).status, 409);

        let query = HttpRequest::json(
            HttpMethod::Post,
            "/query",
            &json!({"historyNextExists": false, "target": "C1", "type": "AnnotationPage"}),
        )
        .unwrap();
        let tips = server.handle(&query).json_body().unwrap();
        assert_eq!(tips.as_array().unwrap().len(), 1);
        assert_eq!(tips[0]["items"][0]["id"], json!("A"));
    }
}
