//! Oracle deltas and their consumers
//!
//! A delta is the batch notification the oracle broadcasts after every
//! commit or abort: which start timestamps resolved to which commit
//! timestamps, which were discarded, and the new high-water mark. Applying a
//! delta twice has the same effect as applying it once.

use quiver_storage::{GraphStore, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Batch of transaction outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleDelta {
    /// start_ts -> commit_ts for newly committed transactions
    #[serde(default)]
    pub commits: BTreeMap<u64, u64>,
    /// start_ts of newly aborted transactions
    #[serde(default)]
    pub aborts: Vec<u64>,
    /// Highest timestamp the producer had assigned
    #[serde(default)]
    pub max_assigned: u64,
}

impl OracleDelta {
    /// Delta carrying a single commit
    pub fn commit(start_ts: u64, commit_ts: u64) -> Self {
        let mut commits = BTreeMap::new();
        commits.insert(start_ts, commit_ts);
        Self {
            commits,
            aborts: Vec::new(),
            max_assigned: commit_ts,
        }
    }

    /// Delta carrying a single abort
    pub fn abort(start_ts: u64, max_assigned: u64) -> Self {
        Self {
            commits: BTreeMap::new(),
            aborts: vec![start_ts],
            max_assigned,
        }
    }

    /// True if the delta resolves nothing
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.aborts.is_empty()
    }
}

/// Consumer of broadcast deltas
///
/// Implementations must be idempotent: the oracle may deliver the same
/// outcome more than once (local commit followed by a replayed delta).
pub trait DeltaSink: Send + Sync {
    /// Apply every outcome carried by `delta`
    fn apply_delta(&self, delta: &OracleDelta);
}

impl DeltaSink for GraphStore {
    fn apply_delta(&self, delta: &OracleDelta) {
        for (&start_ts, &commit_ts) in &delta.commits {
            self.resolve(start_ts, Outcome::Committed(commit_ts));
        }
        for &start_ts in &delta.aborts {
            self.resolve(start_ts, Outcome::Aborted);
        }
    }
}
