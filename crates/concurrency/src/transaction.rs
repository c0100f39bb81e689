//! Transaction handles
//!
//! A [`Transaction`] owns one start timestamp from the oracle. Mutations
//! are appended to the version logs immediately as pending entries tagged
//! with that timestamp; nothing is buffered client-side. Commit asks the
//! oracle for a commit timestamp and resolves every pending entry at once.
//!
//! State transitions:
//! - `Active` → `Committed` (commit)
//! - `Active` → `Aborted` (explicit abort, failed commit, or drop)
//!
//! When the oracle already resolved the start timestamp (a replayed delta
//! committed or aborted it), the handle adopts that outcome instead.
//! Terminal states reject further mutations and reads.

use quiver_core::{DirectedEdge, EdgeOp, EntityId, Error, PostingList, Result};
use quiver_storage::GraphStore;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::oracle::{Oracle, TxnOutcome};

/// Current state of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting mutations and reads
    Active,
    /// Committed; mutations visible to readers at or after `commit_ts`
    Committed {
        /// Commit timestamp issued by the oracle
        commit_ts: u64,
    },
    /// Discarded; mutations never visible
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// Per-transaction behaviour
#[derive(Debug, Clone)]
pub struct TxnOptions {
    /// Record a `_predicate_` marker for every set edge
    pub expand_edge: bool,
    /// How long reads wait for the watermark to reach the start timestamp
    pub read_timeout: Duration,
    /// Provenance label stamped on edges that carry none
    pub default_label: Option<String>,
}

impl Default for TxnOptions {
    fn default() -> Self {
        Self {
            expand_edge: false,
            read_timeout: Duration::from_millis(1000),
            default_label: None,
        }
    }
}

/// Owned handle on one transaction
///
/// Dropping an active handle aborts the transaction.
pub struct Transaction {
    start_ts: u64,
    status: TransactionStatus,
    mutations: usize,
    oracle: Arc<Oracle>,
    store: Arc<GraphStore>,
    options: TxnOptions,
}

impl Transaction {
    pub(crate) fn new(
        oracle: Arc<Oracle>,
        store: Arc<GraphStore>,
        options: TxnOptions,
    ) -> Result<Self> {
        let start_ts = oracle.register_start_ts()?;
        Ok(Self {
            start_ts,
            status: TransactionStatus::Active,
            mutations: 0,
            oracle,
            store,
            options,
        })
    }

    /// Start timestamp issued by the oracle
    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Commit timestamp, if committed
    pub fn commit_ts(&self) -> Option<u64> {
        match self.status {
            TransactionStatus::Committed { commit_ts } => Some(commit_ts),
            _ => None,
        }
    }

    /// Number of edges accepted so far, predicate markers excluded
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    fn ensure_active(&self) -> Result<()> {
        match &self.status {
            TransactionStatus::Active => Ok(()),
            TransactionStatus::Committed { .. } => Err(Error::TransactionNotActive {
                start_ts: self.start_ts,
                state: "committed".to_string(),
            }),
            TransactionStatus::Aborted { .. } => Err(Error::TransactionNotActive {
                start_ts: self.start_ts,
                state: "aborted".to_string(),
            }),
        }
    }

    /// Record `edge` as a pending mutation
    ///
    /// A rejected edge leaves the transaction active and the logs untouched.
    /// Edges without a label get the configured default label. With
    /// `expand_edge` set, a set edge is followed by a `_predicate_` marker
    /// for its subject; a marker that cannot be recorded is logged and
    /// skipped.
    pub fn mutate(&mut self, edge: &DirectedEdge) -> Result<()> {
        self.ensure_active()?;
        let edge = match (&edge.label, &self.options.default_label) {
            (None, Some(label)) => Cow::Owned(edge.clone().with_label(label.clone())),
            _ => Cow::Borrowed(edge),
        };
        self.store.add_mutation_with_index(&edge, self.start_ts)?;
        self.mutations += 1;

        if self.options.expand_edge && edge.op == EdgeOp::Set && !edge.is_predicate_marker() {
            let marked = DirectedEdge::predicate_marker(&edge.attribute, edge.entity)
                .and_then(|marker| self.store.add_mutation_with_index(&marker, self.start_ts));
            if let Err(e) = marked {
                tracing::warn!(
                    start_ts = self.start_ts,
                    attribute = %edge.attribute,
                    error = %e,
                    "failed to record predicate marker"
                );
            }
        }
        Ok(())
    }

    /// Record every edge in order, stopping at the first rejection
    pub fn mutate_all<'a, I>(&mut self, edges: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a DirectedEdge>,
    {
        edges.into_iter().try_for_each(|edge| self.mutate(edge))
    }

    /// Targets of `(attribute, entity)` as this transaction sees them
    ///
    /// Includes commits at or before the start timestamp plus this
    /// transaction's own pending mutations.
    pub fn get(&self, entity: EntityId, attribute: &str) -> Result<PostingList> {
        self.ensure_active()?;
        self.oracle.wait_for(self.start_ts, self.options.read_timeout)?;
        Ok(self.store.read_for_txn(entity, attribute, self.start_ts))
    }

    /// Commit, returning the commit timestamp
    ///
    /// If a delta already committed this transaction, its commit timestamp
    /// is returned. Any other failure leaves the transaction in whatever
    /// state the oracle records, aborted if it records none.
    pub fn commit(&mut self) -> Result<u64> {
        self.ensure_active()?;
        match self.oracle.commit_mutations(self.start_ts) {
            Ok(commit_ts) => {
                self.status = TransactionStatus::Committed { commit_ts };
                Ok(commit_ts)
            }
            Err(e) => {
                self.settle(&e);
                match self.status {
                    TransactionStatus::Committed { commit_ts } => Ok(commit_ts),
                    _ => Err(e),
                }
            }
        }
    }

    /// Abort, discarding every pending mutation
    ///
    /// Fails without changing anything visible if a delta already committed
    /// this transaction; the handle then reports `Committed`.
    pub fn abort(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        match self.oracle.abort(self.start_ts) {
            Ok(()) => {
                self.status = TransactionStatus::Aborted {
                    reason: reason.into(),
                };
                Ok(())
            }
            Err(e) => {
                self.settle(&e);
                if let TransactionStatus::Aborted { .. } = self.status {
                    self.status = TransactionStatus::Aborted {
                        reason: reason.into(),
                    };
                    return Ok(());
                }
                Err(e)
            }
        }
    }

    /// Mirror the oracle's record of this transaction after `err`
    fn settle(&mut self, err: &Error) {
        self.status = match self.oracle.outcome(self.start_ts) {
            Some(TxnOutcome::Committed(commit_ts)) => TransactionStatus::Committed { commit_ts },
            Some(TxnOutcome::Active) => TransactionStatus::Active,
            Some(TxnOutcome::Aborted) | None => TransactionStatus::Aborted {
                reason: err.to_string(),
            },
        };
        tracing::debug!(
            start_ts = self.start_ts,
            status = ?self.status,
            error = %err,
            "settled transaction from oracle"
        );
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            tracing::debug!(start_ts = self.start_ts, "dropping active transaction, aborting");
            if let Err(e) = self.oracle.abort(self.start_ts) {
                tracing::debug!(start_ts = self.start_ts, error = %e, "abort on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("start_ts", &self.start_ts)
            .field("status", &self.status)
            .field("mutations", &self.mutations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::OracleDelta;
    use quiver_core::{NO_FACETS, PREDICATE_ATTR};

    fn setup() -> (Arc<Oracle>, Arc<GraphStore>) {
        let oracle = Arc::new(Oracle::new());
        let store = Arc::new(GraphStore::new());
        oracle.subscribe(store.clone());
        (oracle, store)
    }

    fn begin(oracle: &Arc<Oracle>, store: &Arc<GraphStore>, options: TxnOptions) -> Transaction {
        Transaction::new(Arc::clone(oracle), Arc::clone(store), options).unwrap()
    }

    fn e(id: u64) -> EntityId {
        EntityId::new(id)
    }

    #[test]
    fn test_commit_makes_mutations_visible() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        let edge = DirectedEdge::to_value("name", e(1), "Alice", NO_FACETS).unwrap();
        txn.mutate(&edge).unwrap();

        let commit_ts = txn.commit().unwrap();
        assert!(commit_ts > txn.start_ts());
        assert_eq!(txn.commit_ts(), Some(commit_ts));
        assert_eq!(store.read_at(e(1), "name", commit_ts).value_str(), Some("Alice"));
        assert_eq!(store.read_at(e(1), "name", txn.start_ts()).len(), 0);
    }

    #[test]
    fn test_read_your_writes() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        let edge = DirectedEdge::to_uid("friend", e(1), e(2), NO_FACETS).unwrap();
        txn.mutate(&edge).unwrap();
        assert_eq!(txn.get(e(1), "friend").unwrap().uids(), vec![e(2)]);

        let other = begin(&oracle, &store, TxnOptions::default());
        assert!(other.get(e(1), "friend").unwrap().is_empty());
    }

    #[test]
    fn test_drop_aborts() {
        let (oracle, store) = setup();
        let start_ts = {
            let mut txn = begin(&oracle, &store, TxnOptions::default());
            let edge = DirectedEdge::to_value("name", e(1), "Ghost", NO_FACETS).unwrap();
            txn.mutate(&edge).unwrap();
            txn.start_ts()
        };
        assert_eq!(oracle.outcome(start_ts), Some(TxnOutcome::Aborted));
        assert_eq!(store.pending_txn_count(), 0);
        assert!(store.read_at(e(1), "name", oracle.max_assigned()).is_empty());
    }

    #[test]
    fn test_terminal_states_reject_operations() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        txn.abort("user cancelled").unwrap();
        assert_eq!(
            txn.status(),
            &TransactionStatus::Aborted {
                reason: "user cancelled".to_string()
            }
        );

        let edge = DirectedEdge::to_value("name", e(1), "x", NO_FACETS).unwrap();
        assert!(matches!(
            txn.mutate(&edge),
            Err(Error::TransactionNotActive { .. })
        ));
        assert!(txn.commit().is_err());
        assert!(txn.get(e(1), "name").is_err());
    }

    #[test]
    fn test_rejected_edge_keeps_transaction_active() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        let good = DirectedEdge::to_uid("friend", e(1), e(2), NO_FACETS).unwrap();
        txn.mutate(&good).unwrap();

        let bad = DirectedEdge::to_value("friend", e(1), "oops", NO_FACETS).unwrap();
        assert!(txn.mutate(&bad).is_err());
        assert!(txn.is_active());
        assert_eq!(txn.mutation_count(), 1);
        txn.commit().unwrap();
    }

    #[test]
    fn test_expand_edge_records_marker() {
        let (oracle, store) = setup();
        let options = TxnOptions {
            expand_edge: true,
            ..TxnOptions::default()
        };
        let mut txn = begin(&oracle, &store, options);
        txn.mutate_all(&[
            DirectedEdge::to_value("name", e(1), "Alice", NO_FACETS).unwrap(),
            DirectedEdge::to_value("age", e(1), "30", NO_FACETS).unwrap(),
            DirectedEdge::del_all("friend", e(1)).unwrap(),
        ])
        .unwrap();
        let commit_ts = txn.commit().unwrap();

        let markers = store.read_at(e(1), PREDICATE_ATTR, commit_ts);
        assert_eq!(markers.values(), vec![&b"age"[..], &b"name"[..]]);
        assert_eq!(txn.mutation_count(), 3);
    }

    #[test]
    fn test_default_label_fills_missing_only() {
        let (oracle, store) = setup();
        let options = TxnOptions {
            default_label: Some("testing".to_string()),
            ..TxnOptions::default()
        };
        let mut txn = begin(&oracle, &store, options);
        txn.mutate(&DirectedEdge::to_value("name", e(1), "Alice", NO_FACETS).unwrap())
            .unwrap();
        txn.mutate(
            &DirectedEdge::to_uid("friend", e(1), e(2), NO_FACETS)
                .unwrap()
                .with_label("import"),
        )
        .unwrap();
        let commit_ts = txn.commit().unwrap();

        let name = store.read_at(e(1), "name", commit_ts);
        assert_eq!(name.iter().next().unwrap().label.as_deref(), Some("testing"));
        let friend = store.read_at(e(1), "friend", commit_ts);
        assert_eq!(friend.iter().next().unwrap().label.as_deref(), Some("import"));
    }

    #[test]
    fn test_commit_after_external_abort() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        oracle.abort(txn.start_ts()).unwrap();
        assert!(matches!(
            txn.commit(),
            Err(Error::UnknownTransaction { .. })
        ));
        assert!(matches!(txn.status(), TransactionStatus::Aborted { .. }));
    }

    #[test]
    fn test_commit_after_delta_commit_reports_committed() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        txn.mutate(&DirectedEdge::to_value("name", e(1), "A", NO_FACETS).unwrap())
            .unwrap();
        let start_ts = txn.start_ts();
        oracle.process_delta(&OracleDelta::commit(start_ts, start_ts + 1));

        assert_eq!(txn.commit().unwrap(), start_ts + 1);
        assert_eq!(
            txn.status(),
            &TransactionStatus::Committed {
                commit_ts: start_ts + 1
            }
        );
        assert_eq!(
            store.read_at(e(1), "name", start_ts + 1).value_str(),
            Some("A")
        );
    }

    #[test]
    fn test_abort_after_delta_commit_fails() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        txn.mutate(&DirectedEdge::to_value("name", e(1), "A", NO_FACETS).unwrap())
            .unwrap();
        let start_ts = txn.start_ts();
        oracle.process_delta(&OracleDelta::commit(start_ts, start_ts + 1));

        assert!(matches!(
            txn.abort("too late"),
            Err(Error::UnknownTransaction { .. })
        ));
        assert_eq!(txn.commit_ts(), Some(start_ts + 1));
        assert_eq!(
            store.read_at(e(1), "name", start_ts + 1).value_str(),
            Some("A")
        );
    }

    #[test]
    fn test_abort_after_delta_abort_succeeds() {
        let (oracle, store) = setup();
        let mut txn = begin(&oracle, &store, TxnOptions::default());
        let start_ts = txn.start_ts();
        oracle.process_delta(&OracleDelta::abort(start_ts, start_ts));

        txn.abort("cancelled").unwrap();
        assert_eq!(
            txn.status(),
            &TransactionStatus::Aborted {
                reason: "cancelled".to_string()
            }
        );
    }
}
