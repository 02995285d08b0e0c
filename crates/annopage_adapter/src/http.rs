//! HTTP transport implementation.
//!
//! This module provides an HTTP-based [`DocumentStore`]. The actual HTTP
//! client is abstracted via a trait so the same store can run over reqwest,
//! over a loopback into an in-process server, or over a test double.

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::transport::DocumentStore;
use annopage_protocol::{DocumentId, Endpoints, HttpMethod, HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    ///
    /// `Err` means no response was received; non-2xx statuses are `Ok`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// A document store reached over HTTP with JSON bodies.
pub struct HttpStore<C: HttpClient> {
    /// Base URL of the store (e.g., "https://tinydev.rerum.io").
    base_url: String,
    /// Store paths and verbs.
    endpoints: Endpoints,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpStore<C> {
    /// Creates a new HTTP store.
    pub fn new(base_url: impl Into<String>, endpoints: Endpoints, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            endpoints,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Creates an HTTP store for the configured base URL and endpoints.
    pub fn from_config(config: &AdapterConfig, client: C) -> Self {
        Self::new(config.base_url.clone(), config.endpoints.clone(), client)
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn fail(&self, err: AdapterError) -> AdapterError {
        *self.last_error.write() = Some(err.to_string());
        err
    }

    async fn exchange(&self, request: HttpRequest) -> AdapterResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "store request");

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| self.fail(AdapterError::transport_retryable(e)))?;

        if !response.is_success() {
            return Err(self.fail(AdapterError::Status {
                status: response.status,
                message: response.text(),
            }));
        }

        *self.last_error.write() = None;
        Ok(response)
    }

    async fn exchange_json(&self, method: HttpMethod, path: &str, body: &Value) -> AdapterResult<Value> {
        let request = HttpRequest::json(method, self.url(path), body)?;
        let response = self.exchange(request).await?;
        response
            .json_body()
            .map_err(|e| self.fail(AdapterError::Protocol(format!("Failed to decode response: {}", e))))
    }
}

#[async_trait]
impl<C: HttpClient> DocumentStore for HttpStore<C> {
    async fn query(&self, query: &Value) -> AdapterResult<Vec<Value>> {
        match self
            .exchange_json(HttpMethod::Post, &self.endpoints.query, query)
            .await?
        {
            Value::Array(documents) => Ok(documents),
            Value::Null => Ok(Vec::new()),
            other => Err(self.fail(AdapterError::Protocol(format!(
                "expected a query result array, got {}",
                other
            )))),
        }
    }

    async fn create(&self, document: &Value) -> AdapterResult<Value> {
        self.exchange_json(HttpMethod::Post, &self.endpoints.create, document)
            .await
    }

    async fn update(&self, document: &Value) -> AdapterResult<Value> {
        self.exchange_json(self.endpoints.update_method, &self.endpoints.update, document)
            .await
    }

    async fn delete(&self, id: &DocumentId) -> AdapterResult<()> {
        let url = self.url(&self.endpoints.delete_path(id));
        self.exchange(HttpRequest::new(HttpMethod::Delete, url))
            .await
            .map(|_| ())
    }
}

/// An [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with reqwest's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client whose connections give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> AdapterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(body) = request.body {
            builder = builder
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/json; charset=utf-8",
                )
                .body(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request whose `url` has been reduced to its path.
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Strips scheme and authority, leaving the path (ids inside the path may
/// themselves be URLs and are kept intact).
fn path_of(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => url,
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let request = HttpRequest {
            url: path_of(&request.url).to_string(),
            ..request
        };
        Ok(self.server.handle(&request))
    }
}
