//! Request routing for the store endpoints.

use crate::error::{ServerError, ServerResult};
use crate::store::{UpdateMode, VersionedStore};
use annopage_protocol::{HttpMethod, HttpRequest, HttpResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Handler for store requests.
///
/// Routes are matched on the first path segment, so `/create` and `/create/`
/// are the same route and everything after `/delete/` is the document key.
pub struct RequestHandler {
    store: Arc<VersionedStore>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(store: Arc<VersionedStore>) -> Self {
        Self { store }
    }

    /// Handles a request whose `url` is a path.
    pub fn handle(&self, request: &HttpRequest) -> ServerResult<HttpResponse> {
        let path = request.url.split('?').next().unwrap_or_default();
        let (route, rest) = split_route(path);
        debug!(method = %request.method, route, "store request");

        match (route, request.method) {
            ("query", HttpMethod::Post) => {
                let results = self.store.query(&self.body(request)?)?;
                Ok(HttpResponse::json(200, &Value::Array(results))?)
            }
            ("create", HttpMethod::Post) => {
                let created = self.store.create(self.body(request)?)?;
                Ok(HttpResponse::json(201, &created)?)
            }
            ("patch", HttpMethod::Patch) => {
                let updated = self.store.update(self.body(request)?, UpdateMode::Merge)?;
                Ok(HttpResponse::json(200, &updated)?)
            }
            ("update", HttpMethod::Put) => {
                let updated = self.store.update(self.body(request)?, UpdateMode::Replace)?;
                Ok(HttpResponse::json(200, &updated)?)
            }
            ("delete", HttpMethod::Delete) => {
                let key = rest.trim_end_matches('/');
                if key.is_empty() {
                    return Err(ServerError::InvalidRequest("delete requires an id".into()));
                }
                self.store.delete(key)?;
                Ok(HttpResponse::empty(204))
            }
            ("query" | "create" | "patch" | "update" | "delete", method) => {
                Err(ServerError::MethodNotAllowed {
                    method: method.to_string(),
                    path: path.to_string(),
                })
            }
            _ => Err(ServerError::UnknownRoute(path.to_string())),
        }
    }

    fn body(&self, request: &HttpRequest) -> ServerResult<Value> {
        let size = request.body.as_ref().map_or(0, Vec::len);
        let limit = self.store.config().max_body_bytes;
        if size > limit {
            return Err(ServerError::PayloadTooLarge { size, limit });
        }
        match request.body {
            Some(ref bytes) => Ok(serde_json::from_slice(bytes)?),
            None => Err(ServerError::InvalidRequest("request body required".into())),
        }
    }
}

/// Splits `/delete/http://x/y` into `("delete", "http://x/y")`.
fn split_route(path: &str) -> (&str, &str) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((route, rest)) => (route, rest),
        None => (trimmed, ""),
    }
}
