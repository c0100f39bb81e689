//! Core traits for snapshot abstraction
//!
//! [`SnapshotView`] is the seam between the transactional core and anything
//! that evaluates queries: an executor asks a view for one key at a time and
//! assembles its own result tree.

use crate::error::Result;
use crate::posting::PostingList;
use crate::types::EntityId;

/// Read-only view of the graph at a fixed read timestamp
///
/// Thread safety: views are shared across executor threads (Send + Sync).
///
/// Guarantees:
/// - Every `get` observes exactly the commits with commit_ts <= `read_ts()`
/// - Repeated `get` calls for the same key return the same result
pub trait SnapshotView: Send + Sync {
    /// Read timestamp of this view
    fn read_ts(&self) -> u64;

    /// Live targets of `(attribute, entity)`
    ///
    /// Returns an empty list for keys that were never written.
    ///
    /// # Errors
    ///
    /// Implementations may fail if the underlying store is unavailable.
    fn get(&self, entity: EntityId, attribute: &str) -> Result<PostingList>;
}
