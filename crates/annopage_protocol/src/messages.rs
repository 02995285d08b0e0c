//! HTTP messages and endpoint layout of a versioned document store.

use crate::document::DocumentId;
use crate::error::ProtocolResult;
use serde_json::Value;
use std::fmt;

/// HTTP method used by the store protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Parses a method name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request with an optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// UTF-8 JSON body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request without a body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    /// Creates a request carrying `body` as JSON.
    pub fn json(method: HttpMethod, url: impl Into<String>, body: &Value) -> ProtocolResult<Self> {
        Ok(Self {
            method,
            url: url.into(),
            body: Some(serde_json::to_vec(body)?),
        })
    }

    /// Decodes the body as JSON; an absent body decodes to `null`.
    pub fn json_body(&self) -> ProtocolResult<Value> {
        match self.body {
            Some(ref bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(bytes)?),
            _ => Ok(Value::Null),
        }
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> ProtocolResult<Self> {
        Ok(Self {
            status,
            body: serde_json::to_vec(body)?,
        })
    }

    /// Creates an empty response.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON; an empty body decodes to `null`.
    pub fn json_body(&self) -> ProtocolResult<Value> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Which form of the id is appended to the delete path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteKey {
    /// The full id, verbatim (`/delete/https://store/v1/id/abc`).
    #[default]
    FullId,
    /// The last path segment of the id (`/delete/abc`).
    Slug,
}

/// Paths and verbs of a versioned document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Query path (POST).
    pub query: String,
    /// Create path (POST).
    pub create: String,
    /// Update path.
    pub update: String,
    /// Update verb (PATCH or PUT).
    pub update_method: HttpMethod,
    /// Delete path prefix (DELETE), the id is appended.
    pub delete: String,
    /// How the id is appended to `delete`.
    pub delete_key: DeleteKey,
}

impl Endpoints {
    /// `/query`, `/create`, PATCH `/patch`, DELETE `/delete/{id}`.
    pub fn standard() -> Self {
        Self {
            query: "/query".into(),
            create: "/create".into(),
            update: "/patch".into(),
            update_method: HttpMethod::Patch,
            delete: "/delete".into(),
            delete_key: DeleteKey::FullId,
        }
    }

    /// The RERUM sandbox layout (trailing-slash create and patch paths).
    pub fn rerum() -> Self {
        Self {
            query: "/query".into(),
            create: "/create/".into(),
            update: "/patch/".into(),
            update_method: HttpMethod::Patch,
            delete: "/delete".into(),
            delete_key: DeleteKey::FullId,
        }
    }

    /// Uses PUT `/update` (full replacement) instead of PATCH.
    pub fn with_put_update(mut self) -> Self {
        self.update = "/update".into();
        self.update_method = HttpMethod::Put;
        self
    }

    /// Sets the update path and verb.
    pub fn with_update(mut self, path: impl Into<String>, method: HttpMethod) -> Self {
        self.update = path.into();
        self.update_method = method;
        self
    }

    /// Sets the delete key form.
    pub fn with_delete_key(mut self, key: DeleteKey) -> Self {
        self.delete_key = key;
        self
    }

    /// Builds the delete path for `id`.
    pub fn delete_path(&self, id: &DocumentId) -> String {
        let key = match self.delete_key {
            DeleteKey::FullId => id.as_str(),
            DeleteKey::Slug => id.slug(),
        };
        format!("{}/{}", self.delete.trim_end_matches('/'), key)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::standard()
    }
}
