//! Storage layer for quiver
//!
//! This crate implements the versioned graph storage with:
//! - VersionLog: append-only per-key log of pending/committed/aborted entries
//! - GraphStore: DashMap of version logs plus a pending index by start_ts
//! - SchemaStore: per-attribute type and index options
//!
//! # Concurrency
//!
//! - Each key's log is independently locked; unrelated keys never contend
//! - Resolution is a compare-and-set on an entry's outcome, so it is safe
//!   to race with readers and idempotent under redelivery
//! - The store holds no global version counter: timestamps belong to the
//!   oracle in `quiver-concurrency`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod schema;
pub mod store;
pub mod version_log;

pub use schema::{SchemaEntry, SchemaStore};
pub use store::{GraphStore, StoreOptions};
pub use version_log::{LogEntry, LogRecord, Outcome, VersionLog};
