//! Snapshot readers
//!
//! A [`SnapshotReader`] answers "what targets did `(attribute, entity)` have
//! as of `read_ts`". It reads live version logs with a timestamp bound, so
//! creating one is O(1) and holds no locks.
//!
//! # Snapshot Isolation Guarantees
//!
//! **Always visible**: every mutation whose transaction committed at or
//! before `read_ts`.
//!
//! **Never visible**:
//! - commits after `read_ts`
//! - pending or aborted mutations
//! - part of a transaction's mutations without the rest
//!
//! The manager only hands out readers for `read_ts <= max_assigned`, which
//! guarantees every commit at or below `read_ts` is already resolved in the
//! logs. Repeating the same read therefore always yields the same result.

use quiver_core::{EntityId, PostingList, Result, SnapshotView};
use quiver_storage::GraphStore;
use std::sync::Arc;

/// Read-only, point-in-time view of a [`GraphStore`]
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    store: Arc<GraphStore>,
    read_ts: u64,
}

impl SnapshotReader {
    pub(crate) fn new(store: Arc<GraphStore>, read_ts: u64) -> Self {
        Self { store, read_ts }
    }

    /// Timestamp this reader observes
    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }

    /// Live targets of `(attribute, entity)`, sorted by target identity
    pub fn get(&self, entity: EntityId, attribute: &str) -> PostingList {
        self.store.read_at(entity, attribute, self.read_ts)
    }
}

impl SnapshotView for SnapshotReader {
    fn read_ts(&self) -> u64 {
        self.read_ts
    }

    fn get(&self, entity: EntityId, attribute: &str) -> Result<PostingList> {
        Ok(SnapshotReader::get(self, entity, attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::{DirectedEdge, NO_FACETS};
    use quiver_storage::Outcome;

    #[test]
    fn test_reader_bounds_by_timestamp() {
        let store = Arc::new(GraphStore::new());
        let edge = DirectedEdge::to_value("name", EntityId::new(1), "Alice", NO_FACETS).unwrap();
        store.add_mutation_with_index(&edge, 10).unwrap();
        store.resolve(10, Outcome::Committed(11));

        let before = SnapshotReader::new(Arc::clone(&store), 10);
        let after = SnapshotReader::new(Arc::clone(&store), 11);
        assert!(before.get(EntityId::new(1), "name").is_empty());
        assert_eq!(after.get(EntityId::new(1), "name").value_str(), Some("Alice"));
    }

    #[test]
    fn test_reader_as_trait_object() {
        let store = Arc::new(GraphStore::new());
        let reader = SnapshotReader::new(store, 7);
        let view: &dyn SnapshotView = &reader;
        assert_eq!(view.read_ts(), 7);
        let list = view.get(EntityId::new(3), "name").unwrap();
        assert_eq!(list.read_ts(), 7);
        assert!(list.is_empty());
    }
}
