//! Query results and the executor seam
//!
//! Query parsing and execution live outside this crate. An executor is
//! handed a [`SnapshotView`] and returns JSON; the database wraps that in
//! the `{"data": ...}` envelope together with server-side latency.

use quiver_core::{Result, SnapshotView};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Runs one query against a snapshot
pub trait QueryExecutor {
    /// Produce the `data` payload from `view`
    fn execute(&self, view: &dyn SnapshotView) -> Result<Value>;
}

impl<F> QueryExecutor for F
where
    F: Fn(&dyn SnapshotView) -> Result<Value>,
{
    fn execute(&self, view: &dyn SnapshotView) -> Result<Value> {
        self(view)
    }
}

/// Server-side timings of one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    /// Snapshot acquisition
    pub snapshot_ns: u64,
    /// Executor run
    pub processing_ns: u64,
}

impl Latency {
    pub(crate) fn new(snapshot: Duration, processing: Duration) -> Self {
        Self {
            snapshot_ns: saturating_nanos(snapshot),
            processing_ns: saturating_nanos(processing),
        }
    }

    /// Sum of all phases
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.snapshot_ns.saturating_add(self.processing_ns))
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Result of [`Database::query`](crate::Database::query)
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Executor output
    pub data: Value,
    /// Timestamp the query read at
    pub read_ts: u64,
    /// Server-side timings
    pub latency: Latency,
}

impl Response {
    /// Wire envelope: `{"data": ..., "extensions": {"server_latency": ...}}`
    pub fn to_json(&self) -> Value {
        json!({
            "data": self.data,
            "extensions": {
                "server_latency": self.latency,
                "read_ts": self.read_ts,
            },
        })
    }

    /// Envelope with the `data` member only, serialized
    pub fn data_json(&self) -> String {
        json!({ "data": self.data }).to_string()
    }
}
