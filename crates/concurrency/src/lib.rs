//! Concurrency layer for quiver
//!
//! This crate implements snapshot-isolated transactions over the version
//! logs in `quiver-storage`:
//! - Oracle: start/commit timestamps, outcomes, visibility watermark
//! - OracleDelta: broadcast batches of outcomes, idempotent to re-apply
//! - Transaction: owned handle, mutations appended as pending entries
//! - TransactionManager: wires oracle and store, hands out snapshot readers
//! - SnapshotReader: read-only view bounded by a read timestamp

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delta;
pub mod manager;
pub mod oracle;
pub mod snapshot;
pub mod transaction;

pub use delta::{DeltaSink, OracleDelta};
pub use manager::TransactionManager;
pub use oracle::{Oracle, OracleStats, TxnOutcome};
pub use snapshot::SnapshotReader;
pub use transaction::{Transaction, TransactionStatus, TxnOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Oracle: Send, Sync);
    assert_impl_all!(TransactionManager: Send, Sync, Clone);
    assert_impl_all!(SnapshotReader: Send, Sync, Clone);
    assert_impl_all!(Transaction: Send);
    assert_impl_all!(OracleDelta: Send, Sync, Clone);
}
