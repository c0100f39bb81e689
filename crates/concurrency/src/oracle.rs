//! Timestamp oracle
//!
//! Issues start and commit timestamps from one strictly increasing counter,
//! records every transaction's outcome, and broadcasts those outcomes as
//! [`OracleDelta`]s to subscribed [`DeltaSink`]s.
//!
//! # Design
//!
//! - Start and commit timestamps share the counter, so a commit timestamp is
//!   always greater than every timestamp issued before the commit call,
//!   including the committing transaction's own start timestamp
//! - Timestamp 0 is never issued; it is reserved for "no timestamp".
//!   Nothing above [`MAX_TIMESTAMP`] is issued or accepted from a delta
//! - `max_assigned` is the visibility watermark: readers at or below it see
//!   a settled past. A commit timestamp becomes covered by the watermark
//!   only after its delta reached every sink, so a reader can never observe
//!   a commit timestamp whose mutations are still pending
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. lock state; drop start_ts from the active set
//! 2. reserve commit_ts = last_issued + 1; mark it in flight
//! 3. unlock; broadcast OracleDelta { start_ts: commit_ts } to sinks
//! 4. lock state; clear in-flight mark; advance max_assigned
//! 5. wake readers blocked in wait_for
//! ```
//!
//! While a commit is in flight, `max_assigned` stays below its timestamp even
//! if later timestamps are issued.

use parking_lot::{Condvar, Mutex, RwLock};
use quiver_core::{Error, Result, MAX_TIMESTAMP};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::delta::{DeltaSink, OracleDelta};

/// Resolution state of a start timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    /// Registered, neither committed nor aborted
    Active,
    /// Committed at the carried timestamp
    Committed(u64),
    /// Discarded
    Aborted,
}

/// Point-in-time copy of the oracle's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleStats {
    /// Highest timestamp issued or merged
    pub last_issued: u64,
    /// Visibility watermark
    pub max_assigned: u64,
    /// Registered, unresolved transactions
    pub active: usize,
    /// Committed transactions
    pub committed: usize,
    /// Aborted transactions
    pub aborted: usize,
}

#[derive(Default)]
struct OracleState {
    last_issued: u64,
    active: FxHashSet<u64>,
    committed: FxHashMap<u64, u64>,
    aborted: FxHashSet<u64>,
    /// Commit timestamps whose delta has not reached the sinks yet
    in_flight: BTreeSet<u64>,
}

impl OracleState {
    fn issue(&mut self) -> Result<u64> {
        let next = self
            .last_issued
            .checked_add(1)
            .filter(|&ts| ts <= MAX_TIMESTAMP)
            .ok_or(Error::TimestampsExhausted {
                last_issued: self.last_issued,
            })?;
        self.last_issued = next;
        Ok(next)
    }

    fn watermark(&self) -> u64 {
        match self.in_flight.first() {
            Some(&ts) => ts - 1,
            None => self.last_issued,
        }
    }
}

/// Timestamp oracle
pub struct Oracle {
    state: Mutex<OracleState>,
    max_assigned: AtomicU64,
    caught_up: Condvar,
    sinks: RwLock<Vec<Arc<dyn DeltaSink>>>,
}

impl Oracle {
    /// Create an oracle whose first issued timestamp is 1
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Create an oracle whose first issued timestamp is `last_issued + 1`
    pub fn starting_after(last_issued: u64) -> Self {
        Oracle {
            state: Mutex::new(OracleState {
                last_issued,
                ..OracleState::default()
            }),
            max_assigned: AtomicU64::new(last_issued),
            caught_up: Condvar::new(),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Deliver every future delta to `sink`
    pub fn subscribe(&self, sink: Arc<dyn DeltaSink>) {
        self.sinks.write().push(sink);
    }

    /// Issue a fresh start timestamp and mark it active
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampsExhausted`] once [`MAX_TIMESTAMP`] has
    /// been issued.
    pub fn register_start_ts(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let start_ts = state.issue()?;
        state.active.insert(start_ts);
        self.publish_watermark(&state);
        tracing::debug!(start_ts, "registered transaction");
        Ok(start_ts)
    }

    /// Commit the transaction started at `start_ts`
    ///
    /// Returns the commit timestamp. Every mutation recorded under
    /// `start_ts` is resolved in the sinks before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTransaction`] if `start_ts` was never
    /// registered or is already committed or aborted. The transaction stays
    /// active on [`Error::TimestampsExhausted`].
    pub fn commit_mutations(&self, start_ts: u64) -> Result<u64> {
        let commit_ts = {
            let mut state = self.state.lock();
            if !state.active.contains(&start_ts) {
                return Err(Self::not_active(&state, start_ts));
            }
            let commit_ts = state.issue()?;
            state.active.remove(&start_ts);
            state.committed.insert(start_ts, commit_ts);
            state.in_flight.insert(commit_ts);
            commit_ts
        };

        self.broadcast(&OracleDelta::commit(start_ts, commit_ts));

        let mut state = self.state.lock();
        state.in_flight.remove(&commit_ts);
        self.publish_watermark(&state);
        tracing::debug!(start_ts, commit_ts, "committed transaction");
        Ok(commit_ts)
    }

    /// Abort the transaction started at `start_ts`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTransaction`] if `start_ts` was never
    /// registered or is already committed or aborted.
    pub fn abort(&self, start_ts: u64) -> Result<()> {
        let max_assigned = {
            let mut state = self.state.lock();
            if !state.active.remove(&start_ts) {
                return Err(Self::not_active(&state, start_ts));
            }
            state.aborted.insert(start_ts);
            self.max_assigned()
        };
        self.broadcast(&OracleDelta::abort(start_ts, max_assigned));
        tracing::debug!(start_ts, "aborted transaction");
        Ok(())
    }

    /// Merge an externally produced delta
    ///
    /// New outcomes are recorded and forwarded to the sinks; outcomes that
    /// contradict what the oracle already knows, and timestamps above
    /// [`MAX_TIMESTAMP`], are skipped with a warning. Applying the same delta
    /// again changes nothing.
    pub fn process_delta(&self, delta: &OracleDelta) {
        let delta_max = if delta.max_assigned > MAX_TIMESTAMP {
            tracing::warn!(max_assigned = delta.max_assigned, "ignoring out-of-range max_assigned");
            0
        } else {
            delta.max_assigned
        };

        let fresh = {
            let mut state = self.state.lock();
            let mut fresh = OracleDelta {
                max_assigned: delta_max,
                ..OracleDelta::default()
            };

            for (&start_ts, &commit_ts) in &delta.commits {
                if commit_ts <= start_ts {
                    tracing::warn!(start_ts, commit_ts, "ignoring commit not after its start");
                    continue;
                }
                if commit_ts > MAX_TIMESTAMP {
                    tracing::warn!(start_ts, commit_ts, "ignoring out-of-range commit in delta");
                    continue;
                }
                if let Some(&known) = state.committed.get(&start_ts) {
                    if known != commit_ts {
                        tracing::warn!(start_ts, known, commit_ts, "ignoring conflicting commit in delta");
                    }
                    continue;
                }
                if state.aborted.contains(&start_ts) {
                    tracing::warn!(start_ts, commit_ts, "ignoring commit of aborted transaction");
                    continue;
                }
                state.active.remove(&start_ts);
                state.committed.insert(start_ts, commit_ts);
                state.last_issued = state.last_issued.max(commit_ts);
                if commit_ts > self.max_assigned() {
                    state.in_flight.insert(commit_ts);
                } else {
                    tracing::warn!(start_ts, commit_ts, "delta commit below watermark");
                }
                fresh.commits.insert(start_ts, commit_ts);
            }

            for &start_ts in &delta.aborts {
                if state.committed.contains_key(&start_ts) {
                    tracing::warn!(start_ts, "ignoring abort of committed transaction");
                    continue;
                }
                if state.aborted.insert(start_ts) {
                    state.active.remove(&start_ts);
                    fresh.aborts.push(start_ts);
                }
            }

            state.last_issued = state.last_issued.max(delta_max);
            self.publish_watermark(&state);
            fresh
        };

        if fresh.is_empty() {
            return;
        }
        self.broadcast(&fresh);

        let mut state = self.state.lock();
        for commit_ts in fresh.commits.values() {
            state.in_flight.remove(commit_ts);
        }
        self.publish_watermark(&state);
        tracing::debug!(
            commits = fresh.commits.len(),
            aborts = fresh.aborts.len(),
            max_assigned = self.max_assigned(),
            "merged oracle delta"
        );
    }

    /// Visibility watermark
    pub fn max_assigned(&self) -> u64 {
        self.max_assigned.load(Ordering::Acquire)
    }

    /// Resolution state of `start_ts`, `None` if never seen
    pub fn outcome(&self, start_ts: u64) -> Option<TxnOutcome> {
        let state = self.state.lock();
        if let Some(&commit_ts) = state.committed.get(&start_ts) {
            Some(TxnOutcome::Committed(commit_ts))
        } else if state.aborted.contains(&start_ts) {
            Some(TxnOutcome::Aborted)
        } else if state.active.contains(&start_ts) {
            Some(TxnOutcome::Active)
        } else {
            None
        }
    }

    /// Number of registered, unresolved transactions
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Bookkeeping counters
    pub fn stats(&self) -> OracleStats {
        let state = self.state.lock();
        OracleStats {
            last_issued: state.last_issued,
            max_assigned: self.max_assigned(),
            active: state.active.len(),
            committed: state.committed.len(),
            aborted: state.aborted.len(),
        }
    }

    /// Block until `max_assigned >= read_ts` or `timeout` elapses
    pub fn wait_for(&self, read_ts: u64, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while self.max_assigned() < read_ts {
            if self.caught_up.wait_until(&mut state, deadline).timed_out() {
                let max_assigned = self.max_assigned();
                if max_assigned >= read_ts {
                    break;
                }
                return Err(Error::StaleRead {
                    read_ts,
                    max_assigned,
                });
            }
        }
        Ok(())
    }

    fn publish_watermark(&self, state: &OracleState) {
        let mark = state.watermark();
        if self.max_assigned.fetch_max(mark, Ordering::AcqRel) < mark {
            self.caught_up.notify_all();
        }
    }

    fn broadcast(&self, delta: &OracleDelta) {
        for sink in self.sinks.read().iter() {
            sink.apply_delta(delta);
        }
    }

    fn not_active(state: &OracleState, start_ts: u64) -> Error {
        if let Some(&commit_ts) = state.committed.get(&start_ts) {
            tracing::debug!(start_ts, commit_ts, "transaction already committed");
        } else if state.aborted.contains(&start_ts) {
            tracing::debug!(start_ts, "transaction already aborted");
        }
        Error::UnknownTransaction { start_ts }
    }
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("max_assigned", &self.max_assigned())
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}
