//! Transaction manager
//!
//! Ties one [`Oracle`] to one [`GraphStore`]: the store is subscribed to the
//! oracle's deltas, transactions are handed out with the configured
//! [`TxnOptions`], and snapshot readers are only created for timestamps the
//! watermark already covers.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. begin()          - oracle issues start_ts
//! 2. mutate(edge)*    - pending entries appended to version logs
//! 3. commit()         - oracle issues commit_ts and broadcasts the delta
//! 4. store resolves   - every pending entry of start_ts becomes committed
//! 5. watermark moves  - readers at commit_ts now see the mutations
//! ```
//!
//! Aborts follow the same path with an abort delta; the entries are
//! discarded instead of committed.

use quiver_core::{DirectedEdge, Error, Result};
use quiver_storage::GraphStore;
use std::sync::Arc;

use crate::delta::OracleDelta;
use crate::oracle::Oracle;
use crate::snapshot::SnapshotReader;
use crate::transaction::{Transaction, TxnOptions};

/// Coordinates transactions and snapshots over a shared store
#[derive(Debug, Clone)]
pub struct TransactionManager {
    oracle: Arc<Oracle>,
    store: Arc<GraphStore>,
    options: TxnOptions,
}

impl TransactionManager {
    /// Create a manager and subscribe `store` to `oracle`
    pub fn new(oracle: Arc<Oracle>, store: Arc<GraphStore>, options: TxnOptions) -> Self {
        oracle.subscribe(store.clone());
        Self {
            oracle,
            store,
            options,
        }
    }

    /// Oracle issuing timestamps
    pub fn oracle(&self) -> &Arc<Oracle> {
        &self.oracle
    }

    /// Store holding the version logs
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Options applied to new transactions
    pub fn options(&self) -> &TxnOptions {
        &self.options
    }

    /// Start a transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampsExhausted`] if the oracle cannot issue a
    /// start timestamp.
    pub fn begin(&self) -> Result<Transaction> {
        Transaction::new(
            Arc::clone(&self.oracle),
            Arc::clone(&self.store),
            self.options.clone(),
        )
    }

    /// Run `edges` in a fresh transaction and commit it
    ///
    /// If any edge is rejected the transaction is aborted and nothing
    /// becomes visible.
    pub fn apply(&self, edges: &[DirectedEdge]) -> Result<u64> {
        let mut txn = self.begin()?;
        if let Err(e) = txn.mutate_all(edges) {
            txn.abort(e.to_string())?;
            return Err(e);
        }
        txn.commit()
    }

    /// Reader at the current watermark
    pub fn snapshot(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.store), self.oracle.max_assigned())
    }

    /// Reader at `read_ts`
    ///
    /// Fails with [`Error::StaleRead`] if the watermark has not reached
    /// `read_ts`, since commits at or below it may still be unresolved.
    pub fn snapshot_at(&self, read_ts: u64) -> Result<SnapshotReader> {
        let max_assigned = self.oracle.max_assigned();
        if read_ts > max_assigned {
            return Err(Error::StaleRead {
                read_ts,
                max_assigned,
            });
        }
        Ok(SnapshotReader::new(Arc::clone(&self.store), read_ts))
    }

    /// Reader at `read_ts`, waiting up to the configured read timeout
    pub fn snapshot_at_blocking(&self, read_ts: u64) -> Result<SnapshotReader> {
        self.oracle.wait_for(read_ts, self.options.read_timeout)?;
        Ok(SnapshotReader::new(Arc::clone(&self.store), read_ts))
    }

    /// Merge an externally produced delta
    pub fn process_delta(&self, delta: &OracleDelta) {
        self.oracle.process_delta(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::{EntityId, NO_FACETS};
    use std::time::Duration;

    fn manager() -> TransactionManager {
        TransactionManager::new(
            Arc::new(Oracle::new()),
            Arc::new(GraphStore::new()),
            TxnOptions {
                read_timeout: Duration::from_millis(20),
                ..TxnOptions::default()
            },
        )
    }

    fn e(id: u64) -> EntityId {
        EntityId::new(id)
    }

    #[test]
    fn test_apply_commits_all_edges() {
        let mgr = manager();
        let commit_ts = mgr
            .apply(&[
                DirectedEdge::to_value("name", e(1), "Alice", NO_FACETS).unwrap(),
                DirectedEdge::to_uid("friend", e(1), e(2), NO_FACETS).unwrap(),
            ])
            .unwrap();

        let snap = mgr.snapshot_at(commit_ts).unwrap();
        assert_eq!(snap.get(e(1), "name").value_str(), Some("Alice"));
        assert_eq!(snap.get(e(1), "friend").uids(), vec![e(2)]);
    }

    #[test]
    fn test_apply_rejected_edge_aborts_everything() {
        let mgr = manager();
        mgr.apply(&[DirectedEdge::to_uid("friend", e(1), e(2), NO_FACETS).unwrap()])
            .unwrap();

        let err = mgr
            .apply(&[
                DirectedEdge::to_value("name", e(5), "Eve", NO_FACETS).unwrap(),
                DirectedEdge::to_value("friend", e(5), "nope", NO_FACETS).unwrap(),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));

        assert!(mgr.snapshot().get(e(5), "name").is_empty());
        assert_eq!(mgr.store().pending_txn_count(), 0);
        assert_eq!(mgr.oracle().active_count(), 0);
    }

    #[test]
    fn test_snapshot_at_rejects_future() {
        let mgr = manager();
        let max = mgr.oracle().max_assigned();
        assert!(matches!(
            mgr.snapshot_at(max + 1),
            Err(Error::StaleRead { .. })
        ));
        assert!(mgr.snapshot_at_blocking(max + 1).is_err());
        assert_eq!(mgr.snapshot_at(max).unwrap().read_ts(), max);
    }

    #[test]
    fn test_snapshot_is_repeatable() {
        let mgr = manager();
        let first = mgr
            .apply(&[DirectedEdge::to_value("name", e(1), "Alice", NO_FACETS).unwrap()])
            .unwrap();
        let snap = mgr.snapshot_at(first).unwrap();
        let before = snap.get(e(1), "name");

        mgr.apply(&[DirectedEdge::to_value("name", e(1), "Alicia", NO_FACETS).unwrap()])
            .unwrap();
        assert_eq!(snap.get(e(1), "name"), before);
        assert_eq!(mgr.snapshot().get(e(1), "name").value_str(), Some("Alicia"));
    }

    #[test]
    fn test_process_delta_resolves_store() {
        let mgr = manager();
        let edge = DirectedEdge::to_value("name", e(9), "Remote", NO_FACETS).unwrap();
        mgr.store().add_mutation_with_index(&edge, 50).unwrap();

        mgr.process_delta(&OracleDelta::commit(50, 51));
        let snap = mgr.snapshot_at(51).unwrap();
        assert_eq!(snap.get(e(9), "name").value_str(), Some("Remote"));
    }
}
