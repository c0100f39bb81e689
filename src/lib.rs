//! Quiver - snapshot-isolated transactional graph store
//!
//! Facts are directed edges `(entity, attribute) -> target` carrying an
//! optional language tag, provenance label, and typed facets. Mutations are
//! staged under a start timestamp issued by the oracle and become visible
//! atomically at their commit timestamp. Reads are always taken at an
//! explicit read timestamp.
//!
//! # Quick Start
//!
//! ```
//! use quiver::{Database, DirectedEdge, EntityId, NO_FACETS};
//!
//! let db = Database::new();
//! let alice = EntityId::new(1);
//!
//! let mut txn = db.begin()?;
//! txn.mutate(&DirectedEdge::to_value("name", alice, "Alice", NO_FACETS)?)?;
//! let commit_ts = txn.commit()?;
//!
//! let snap = db.snapshot_at(commit_ts)?;
//! assert_eq!(snap.get(alice, "name").value_str(), Some("Alice"));
//! # Ok::<(), quiver::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `quiver-core`: ids, edges and builders, facets, errors
//! - `quiver-storage`: per-key version logs, schema registry
//! - `quiver-concurrency`: oracle, transactions, snapshot readers
//!
//! [`Database`] wires one of each together from a [`QuiverConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod response;
pub mod telemetry;

pub use config::{QuiverConfig, CONFIG_FILE_NAME};
pub use response::{Latency, QueryExecutor, Response};

pub use quiver_concurrency::{
    DeltaSink, Oracle, OracleDelta, OracleStats, SnapshotReader, Transaction, TransactionManager,
    TransactionStatus, TxnOptions, TxnOutcome,
};
pub use quiver_core::{
    build_facets, DataKey, DirectedEdge, EdgeOp, EdgeTarget, EntityId, Error, Facet, FacetValue,
    Posting, PostingList, Result, SnapshotView, TargetIdentity, ValueType, NO_FACETS,
    PREDICATE_ATTR,
};
pub use quiver_storage::{GraphStore, SchemaEntry, SchemaStore};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// In-memory graph database
///
/// Cheap to clone; clones share the oracle, store, and schema.
#[derive(Debug, Clone)]
pub struct Database {
    config: QuiverConfig,
    manager: TransactionManager,
}

impl Database {
    /// Database with the default configuration
    pub fn new() -> Self {
        Self::build(QuiverConfig::default())
    }

    /// Database with `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` fails validation.
    pub fn with_config(config: QuiverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Database configured by `dir/quiver.toml`
    ///
    /// A commented default file is written first if none exists.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        QuiverConfig::write_default_if_missing(&path)?;
        let config = QuiverConfig::from_file(&path)?;
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(Self::build(config))
    }

    fn build(config: QuiverConfig) -> Self {
        let store = GraphStore::with_schema(Arc::new(SchemaStore::new()), config.store_options());
        let manager = TransactionManager::new(
            Arc::new(Oracle::new()),
            Arc::new(store),
            config.txn_options(),
        );
        Self { config, manager }
    }

    /// Active configuration
    pub fn config(&self) -> &QuiverConfig {
        &self.config
    }

    /// Install the stderr tracing subscriber at the configured `log_level`
    ///
    /// `RUST_LOG` takes precedence when set. Fails with [`Error::Config`] if
    /// a global subscriber is already installed.
    pub fn init_tracing(&self) -> Result<()> {
        telemetry::init_tracing(&self.config.log_level)
    }

    /// Transaction manager
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Timestamp oracle
    pub fn oracle(&self) -> &Arc<Oracle> {
        self.manager.oracle()
    }

    /// Version-log store
    pub fn store(&self) -> &Arc<GraphStore> {
        self.manager.store()
    }

    /// Attribute schema registry
    pub fn schema(&self) -> &Arc<SchemaStore> {
        self.store().schema()
    }

    /// Declare the schema of `attribute`
    pub fn set_schema(&self, attribute: &str, entry: SchemaEntry) {
        self.schema().set(attribute, entry);
    }

    /// Start a transaction
    pub fn begin(&self) -> Result<Transaction> {
        self.manager.begin()
    }

    /// Commit `edges` as one transaction
    pub fn apply(&self, edges: &[DirectedEdge]) -> Result<u64> {
        self.manager.apply(edges)
    }

    /// Commit a single edge
    pub fn add_edge(&self, edge: &DirectedEdge) -> Result<u64> {
        self.manager.apply(std::slice::from_ref(edge))
    }

    /// Reader at the current watermark
    pub fn snapshot(&self) -> SnapshotReader {
        self.manager.snapshot()
    }

    /// Reader at `read_ts`, rejecting timestamps past the watermark
    pub fn snapshot_at(&self, read_ts: u64) -> Result<SnapshotReader> {
        self.manager.snapshot_at(read_ts)
    }

    /// Reader at `read_ts`, waiting up to `read_wait_timeout_ms`
    pub fn snapshot_at_blocking(&self, read_ts: u64) -> Result<SnapshotReader> {
        self.manager.snapshot_at_blocking(read_ts)
    }

    /// Merge an externally produced delta
    pub fn process_delta(&self, delta: &OracleDelta) {
        self.manager.process_delta(delta);
    }

    /// Run `executor` against a snapshot at the current watermark
    pub fn query(&self, executor: &dyn QueryExecutor) -> Result<Response> {
        let started = Instant::now();
        let snapshot = self.snapshot();
        let snapshot_done = Instant::now();
        let data = executor.execute(&snapshot)?;
        let latency = Latency::new(snapshot_done - started, snapshot_done.elapsed());
        tracing::debug!(read_ts = snapshot.read_ts(), ?latency, "query executed");
        Ok(Response {
            data,
            read_ts: snapshot.read_ts(),
            latency,
        })
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
