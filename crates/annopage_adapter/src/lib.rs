//! # Annopage Adapter
//!
//! Caching storage adapter that mirrors the annotation page of one canvas
//! against a remote, versioned document store.
//!
//! This crate provides:
//! - Remote sync primitives (query, create, update, delete) with timeouts
//! - Annotation page cache (unloaded → empty/loaded → stale-after-write)
//! - CRUD orchestration returning explicit outcomes
//! - Per-canvas adapter registry and host viewer integration
//! - HTTP transport abstraction with a reqwest client and a loopback client
//!
//! ## Architecture
//!
//! Every write against the store yields a document with a **new** id, so the
//! current page is always found by a history-tip query rather than a fixed id:
//! 1. Warm the cache with the current page (or an unpersisted stub)
//! 2. Write the annotation, then write a new version of the page
//! 3. Replace the cached page with the store's response
//!
//! ## Key Invariants
//!
//! - One adapter per canvas; mutations on a canvas never interleave
//! - The cached page is replaced, never mutated in place
//! - Remote failures never panic; they surface as `Outcome` values
//! - Consistency is last-writer-wins; nothing is transactional across the network

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod cache;
mod config;
mod error;
mod host;
mod http;
mod outcome;
mod registry;
mod sync;
mod transport;

pub use adapter::{AdapterStats, AnnotationAdapter};
pub use cache::{CacheState, PageCache, PendingWrite};
pub use config::{AdapterConfig, CachePolicy, CreatorPolicy};
pub use error::{AdapterError, AdapterResult};
pub use host::{AnnotationSink, CanvasWatcher};
pub use http::{HttpClient, HttpStore, LoopbackClient, LoopbackServer, ReqwestClient};
pub use outcome::Outcome;
pub use registry::AdapterRegistry;
pub use sync::{Fallback, RemoteSync, StoreDocument};
pub use transport::{DocumentStore, MockOperation, MockStore};

pub use annopage_protocol::{
    Annotation, AnnotationPage, DocumentFormat, DocumentId, Endpoints, HistoryTip, IdConvention,
};
