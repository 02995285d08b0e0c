//! # Annopage Server
//!
//! Reference in-memory versioned document store.
//!
//! This crate provides:
//! - The store HTTP surface (query, create, patch, update, delete)
//! - Versioned storage where every write yields a new id
//! - History-tip queries in both the flag and the RERUM dialect
//!
//! # Versioning
//!
//! A write never modifies a stored document. PATCH merges the request into
//! the current version and PUT replaces it; either way the result is a new
//! document with a new id, and the previous version is linked to it as its
//! successor. Only documents without a successor answer tip queries, and a
//! superseded version cannot be written again.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::StoreConfig;
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use server::StoreServer;
pub use store::{UpdateMode, VersionedStore};
