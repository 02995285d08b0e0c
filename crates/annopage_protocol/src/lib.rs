//! # Annopage Protocol
//!
//! Document model and wire types for versioned annotation stores.
//!
//! This crate provides:
//! - `Annotation` and `AnnotationPage` with canonical identifiers
//! - `DocumentFormat` for the `id` / `@id` convention and page shape
//! - `PageQuery` for history-tip lookups of the current page
//! - `Endpoints` and the HTTP request/response types shared by clients and servers
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod messages;
mod query;

pub use document::{
    Annotation, AnnotationPage, DocumentFormat, DocumentId, IdConvention, ANNOTATION_PAGE_TYPE,
    WEB_ANNOTATION_CONTEXT,
};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{DeleteKey, Endpoints, HttpMethod, HttpRequest, HttpResponse};
pub use query::{HistoryTip, PageQuery, HISTORY_NEXT_EXISTS_KEY, RERUM_HISTORY_NEXT_KEY};
