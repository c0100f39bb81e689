//! Per-key version log for MVCC
//!
//! A `VersionLog` holds every proposed state of one `(attribute, entity)`
//! key in arrival order: pending entries from in-flight transactions next to
//! committed and aborted ones. Nothing is ever removed by commit or abort;
//! resolution only flips an entry's outcome, so readers holding older
//! snapshots keep seeing a consistent history.
//!
//! # Design
//!
//! - Entries live in an append-only arena (`Vec<Arc<LogEntry>>`) indexed by
//!   start timestamp
//! - Each entry's outcome is an `AtomicU64` resolved by compare-and-set
//!   from `PENDING`, which makes resolution idempotent
//! - Appends take the exclusive lock; reads and resolution take the shared
//!   lock only
//!
//! # Visibility
//!
//! An entry is visible at `read_ts` iff it is committed with
//! `commit_ts <= read_ts`. Among visible entries, newest commit first
//! (arrival order breaks ties within one transaction), the first entry per
//! target identity decides: a SET makes it live, a DEL hides it, and a
//! star DEL hides everything older.

use parking_lot::RwLock;
use quiver_core::{DataKey, DirectedEdge, EdgeOp, Posting, PostingList, TargetIdentity};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const PENDING: u64 = 0;
const ABORTED: u64 = u64::MAX;

/// Resolution state of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Owning transaction has not resolved yet
    Pending,
    /// Committed at the given timestamp
    Committed(u64),
    /// Discarded; never visible
    Aborted,
}

impl Outcome {
    fn encode(self) -> u64 {
        match self {
            Outcome::Pending => PENDING,
            Outcome::Committed(ts) => {
                debug_assert!(ts != PENDING && ts != ABORTED, "commit_ts {} is reserved", ts);
                ts
            }
            Outcome::Aborted => ABORTED,
        }
    }

    fn decode(raw: u64) -> Self {
        match raw {
            PENDING => Outcome::Pending,
            ABORTED => Outcome::Aborted,
            ts => Outcome::Committed(ts),
        }
    }

    /// Commit timestamp, if committed
    pub fn commit_ts(&self) -> Option<u64> {
        match self {
            Outcome::Committed(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// One proposed state of the key
#[derive(Debug)]
pub struct LogEntry {
    edge: DirectedEdge,
    identity: TargetIdentity,
    start_ts: u64,
    seq: usize,
    outcome: AtomicU64,
}

impl LogEntry {
    /// The proposed edge
    pub fn edge(&self) -> &DirectedEdge {
        &self.edge
    }

    /// Target identity within the key
    pub fn identity(&self) -> &TargetIdentity {
        &self.identity
    }

    /// Start timestamp of the owning transaction
    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    /// Current outcome
    #[inline]
    pub fn outcome(&self) -> Outcome {
        Outcome::decode(self.outcome.load(Ordering::Acquire))
    }

    /// Resolve from pending; returns false if already resolved
    fn resolve(&self, outcome: Outcome) -> bool {
        self.outcome
            .compare_exchange(PENDING, outcome.encode(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn visible_at(&self, read_ts: u64) -> Option<u64> {
        self.outcome().commit_ts().filter(|ts| *ts <= read_ts)
    }

    fn to_posting(&self, commit_ts: u64) -> Posting {
        Posting {
            identity: self.identity.clone(),
            target: self.edge.target.clone(),
            label: self.edge.label.clone(),
            facets: self.edge.facets.clone(),
            commit_ts,
        }
    }
}

/// Snapshot of one entry for history listings
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Proposed edge
    pub edge: DirectedEdge,
    /// Owning transaction
    pub start_ts: u64,
    /// Outcome at the time of the listing
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
struct Arena {
    entries: Vec<Arc<LogEntry>>,
    by_start: FxHashMap<u64, SmallVec<[usize; 2]>>,
}

/// Append-only version log for one key
#[derive(Debug)]
pub struct VersionLog {
    key: DataKey,
    arena: RwLock<Arena>,
    pending: AtomicUsize,
}

impl VersionLog {
    /// Create an empty log for `key`
    pub fn new(key: DataKey) -> Self {
        Self {
            key,
            arena: RwLock::new(Arena::default()),
            pending: AtomicUsize::new(0),
        }
    }

    /// Key of this log
    pub fn key(&self) -> &DataKey {
        &self.key
    }

    /// Append a pending entry owned by `start_ts`
    ///
    /// Never rejected for concurrency reasons: any number of transactions
    /// may hold pending entries on the same key.
    pub fn add_mutation(&self, edge: DirectedEdge, identity: TargetIdentity, start_ts: u64) {
        let mut arena = self.arena.write();
        let seq = arena.entries.len();
        arena.entries.push(Arc::new(LogEntry {
            edge,
            identity,
            start_ts,
            seq,
            outcome: AtomicU64::new(PENDING),
        }));
        arena.by_start.entry(start_ts).or_default().push(seq);
        self.pending.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(key = %self.key, start_ts, seq, "appended pending entry");
    }

    /// Resolve every pending entry of `start_ts`
    ///
    /// Idempotent: entries already resolved are left untouched. Returns the
    /// number of entries that changed.
    pub fn resolve(&self, start_ts: u64, outcome: Outcome) -> usize {
        if outcome == Outcome::Pending {
            return 0;
        }
        let arena = self.arena.read();
        let Some(positions) = arena.by_start.get(&start_ts) else {
            return 0;
        };
        let resolved = positions
            .iter()
            .filter(|&&idx| arena.entries[idx].resolve(outcome))
            .count();
        if resolved > 0 {
            self.pending.fetch_sub(resolved, Ordering::AcqRel);
            tracing::trace!(key = %self.key, start_ts, ?outcome, resolved, "resolved entries");
        }
        resolved
    }

    /// Live targets at `read_ts`
    pub fn read_at(&self, read_ts: u64) -> PostingList {
        let arena = self.arena.read();
        let visible: Vec<(u64, &LogEntry)> = arena
            .entries
            .iter()
            .filter_map(|e| e.visible_at(read_ts).map(|ts| (ts, e.as_ref())))
            .collect();
        PostingList::new(self.key.clone(), read_ts, fold_newest_first(visible))
    }

    /// Live targets as seen by the transaction `start_ts`
    ///
    /// Commits up to `start_ts` plus the transaction's own pending entries,
    /// which order after every commit in arrival order.
    pub fn read_for_txn(&self, start_ts: u64) -> PostingList {
        let arena = self.arena.read();
        let visible: Vec<(u64, &LogEntry)> = arena
            .entries
            .iter()
            .filter_map(|e| {
                if e.start_ts == start_ts && e.outcome() == Outcome::Pending {
                    Some((u64::MAX, e.as_ref()))
                } else {
                    e.visible_at(start_ts).map(|ts| (ts, e.as_ref()))
                }
            })
            .collect();
        PostingList::new(self.key.clone(), start_ts, fold_newest_first(visible))
    }

    /// Every entry with its outcome, newest arrival first
    pub fn history(&self) -> Vec<LogRecord> {
        let arena = self.arena.read();
        arena
            .entries
            .iter()
            .rev()
            .map(|e| LogRecord {
                edge: e.edge.clone(),
                start_ts: e.start_ts,
                outcome: e.outcome(),
            })
            .collect()
    }

    /// Entries still waiting for their transaction's outcome
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Total entries ever appended
    pub fn len(&self) -> usize {
        self.arena.read().entries.len()
    }

    /// True if nothing was ever appended
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fold_newest_first(mut visible: Vec<(u64, &LogEntry)>) -> Vec<Posting> {
    visible.sort_unstable_by_key(|(ts, e)| Reverse((*ts, e.seq)));

    let mut seen: FxHashSet<&TargetIdentity> = FxHashSet::default();
    let mut live = Vec::new();
    for (ts, entry) in visible {
        if entry.identity == TargetIdentity::All {
            break;
        }
        if !seen.insert(&entry.identity) {
            continue;
        }
        if entry.edge.op == EdgeOp::Set {
            live.push(entry.to_posting(ts));
        }
    }
    live
}
