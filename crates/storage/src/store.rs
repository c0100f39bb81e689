//! Graph store: one version log per `(attribute, entity)` key
//!
//! # Design
//!
//! - DashMap of `DataKey -> Arc<VersionLog>`: sharded, so mutators of
//!   unrelated keys never contend, while each log serializes its own
//!   appends
//! - Pending index `start_ts -> keys`: lets a commit or abort resolve
//!   exactly the logs a transaction touched, and makes re-delivered
//!   resolutions a no-op once the index entry is gone
//! - Outcome table `start_ts -> Outcome`: the first outcome told for a
//!   start timestamp sticks. An entry appended after its outcome arrived
//!   (a late remote mutation) is resolved on append
//! - Secondary index: entity edges on attributes declared `reverse` are
//!   mirrored into `~attribute` logs under the same start timestamp
//!
//! The store never decides outcomes. It is told about them through
//! [`GraphStore::resolve`], which the transaction layer calls for every
//! commit, abort, and replayed delta.

use dashmap::DashMap;
use quiver_core::{
    DataKey, DirectedEdge, EdgeOp, EdgeTarget, EntityId, PostingList, Result, TargetIdentity,
};
use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::schema::{SchemaEntry, SchemaStore};
use crate::version_log::{Outcome, VersionLog};

/// Options that shape how mutations are applied
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Register a default schema for attributes seen for the first time
    pub auto_register_schema: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            auto_register_schema: true,
        }
    }
}

/// In-memory versioned graph
#[derive(Debug)]
pub struct GraphStore {
    logs: DashMap<DataKey, Arc<VersionLog>>,
    pending: DashMap<u64, FxHashSet<DataKey>>,
    outcomes: DashMap<u64, Outcome>,
    schema: Arc<SchemaStore>,
    options: StoreOptions,
}

impl GraphStore {
    /// Create an empty store with its own schema registry
    pub fn new() -> Self {
        Self::with_schema(Arc::new(SchemaStore::new()), StoreOptions::default())
    }

    /// Create an empty store sharing `schema`
    pub fn with_schema(schema: Arc<SchemaStore>, options: StoreOptions) -> Self {
        Self {
            logs: DashMap::new(),
            pending: DashMap::new(),
            outcomes: DashMap::new(),
            schema,
            options,
        }
    }

    /// Schema registry used for validation and index options
    pub fn schema(&self) -> &Arc<SchemaStore> {
        &self.schema
    }

    /// Log for `key`, if it was ever written
    pub fn get(&self, key: &DataKey) -> Option<Arc<VersionLog>> {
        self.logs.get(key).map(|log| Arc::clone(log.value()))
    }

    /// Log for `key`, created empty if missing
    pub fn get_or_create(&self, key: &DataKey) -> Arc<VersionLog> {
        if let Some(log) = self.logs.get(key) {
            return Arc::clone(log.value());
        }
        Arc::clone(
            self.logs
                .entry(key.clone())
                .or_insert_with(|| Arc::new(VersionLog::new(key.clone())))
                .value(),
        )
    }

    /// Append `edge` as a pending mutation of `start_ts`
    ///
    /// Validates against the schema first (registering a default entry when
    /// enabled), so a rejected edge leaves no trace in any log. Entity edges
    /// on `reverse` attributes are mirrored into the reverse log.
    pub fn add_mutation_with_index(&self, edge: &DirectedEdge, start_ts: u64) -> Result<()> {
        edge.validate_shape()?;
        let schema = self
            .schema
            .check_edge(edge, self.options.auto_register_schema)?
            .unwrap_or_else(|| SchemaEntry::of(edge.target.value_type()));

        let key = edge.data_key();
        if schema.reverse {
            self.mirror_reverse(edge, &key, start_ts);
        }
        self.append(key, edge.clone(), edge.identity(schema.list), start_ts);
        Ok(())
    }

    fn mirror_reverse(&self, edge: &DirectedEdge, key: &DataKey, start_ts: u64) {
        let targets = match &edge.target {
            EdgeTarget::Entity(dst) => vec![*dst],
            // Star delete: unlink every target the transaction currently sees
            EdgeTarget::All => self
                .get(key)
                .map(|log| log.read_for_txn(start_ts).uids())
                .unwrap_or_default(),
            EdgeTarget::Value { .. } => return,
        };

        for dst in targets {
            let mirrored = DirectedEdge {
                attribute: format!("{}{}", quiver_core::REVERSE_PREFIX, edge.attribute),
                entity: dst,
                op: edge.op,
                target: EdgeTarget::Entity(edge.entity),
                label: edge.label.clone(),
                facets: if edge.op == EdgeOp::Set {
                    edge.facets.clone()
                } else {
                    Vec::new()
                },
            };
            let identity = TargetIdentity::Entity(edge.entity);
            self.append(DataKey::reverse(&edge.attribute, dst), mirrored, identity, start_ts);
        }
    }

    fn append(&self, key: DataKey, edge: DirectedEdge, identity: TargetIdentity, start_ts: u64) {
        self.get_or_create(&key).add_mutation(edge, identity, start_ts);
        self.pending.entry(start_ts).or_default().insert(key);

        // Outcome recorded before the pending index saw this key
        let known = self.outcomes.get(&start_ts).map(|o| *o.value());
        if let Some(outcome) = known {
            tracing::debug!(start_ts, ?outcome, "resolving entry appended after its outcome");
            self.resolve(start_ts, outcome);
        }
    }

    /// Resolve every pending entry of `start_ts` across all logs
    ///
    /// The first outcome told for `start_ts` sticks: later calls resolve
    /// with it, whatever they pass. Idempotent. Returns the number of
    /// entries that changed.
    pub fn resolve(&self, start_ts: u64, outcome: Outcome) -> usize {
        if outcome == Outcome::Pending {
            return 0;
        }
        let outcome = *self.outcomes.entry(start_ts).or_insert(outcome).value();
        let Some((_, keys)) = self.pending.remove(&start_ts) else {
            return 0;
        };
        let resolved: usize = keys
            .iter()
            .filter_map(|key| self.get(key))
            .map(|log| log.resolve(start_ts, outcome))
            .sum();
        tracing::trace!(start_ts, ?outcome, keys = keys.len(), resolved, "resolved transaction entries");
        resolved
    }

    /// Live targets of `(attribute, entity)` at `read_ts`
    pub fn read_at(&self, entity: EntityId, attribute: &str, read_ts: u64) -> PostingList {
        let key = DataKey::new(attribute, entity);
        match self.get(&key) {
            Some(log) => log.read_at(read_ts),
            None => PostingList::empty(key, read_ts),
        }
    }

    /// Live targets as seen by transaction `start_ts`, own writes included
    pub fn read_for_txn(&self, entity: EntityId, attribute: &str, start_ts: u64) -> PostingList {
        let key = DataKey::new(attribute, entity);
        match self.get(&key) {
            Some(log) => log.read_for_txn(start_ts),
            None => PostingList::empty(key, start_ts),
        }
    }

    /// Keys touched by `start_ts` that still have unresolved entries
    pub fn pending_keys(&self, start_ts: u64) -> Vec<DataKey> {
        let mut keys: Vec<DataKey> = self
            .pending
            .get(&start_ts)
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of transactions with unresolved entries
    pub fn pending_txn_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of keys ever written
    pub fn key_count(&self) -> usize {
        self.logs.len()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
