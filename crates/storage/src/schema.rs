//! Per-attribute schema registry
//!
//! The schema records, for each attribute, its declared value type and the
//! index options the store honours during mutation (`reverse`, `list`).
//! Lookups are best effort: an attribute without an entry is accepted and,
//! when auto-registration is on, registered with the type of the first edge
//! that touches it.
//!
//! Registration is a check-and-set on the attribute's `DashMap` entry, so
//! concurrent first writers agree on a single winner.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use quiver_core::{DirectedEdge, EdgeTarget, Error, Result, ValueType, PREDICATE_ATTR};

/// Schema of one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    /// Declared value type
    pub value_type: ValueType,
    /// Maintain a `~attribute` reverse log for entity edges
    pub reverse: bool,
    /// Literal values are multi-valued (one identity per distinct value)
    pub list: bool,
}

impl SchemaEntry {
    /// Plain entry of the given type
    pub fn of(value_type: ValueType) -> Self {
        Self {
            value_type,
            reverse: false,
            list: false,
        }
    }

    /// Enable reverse indexing
    pub fn with_reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Enable multi-valued literals
    pub fn with_list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// Concurrent attribute → schema map
#[derive(Debug)]
pub struct SchemaStore {
    entries: DashMap<String, SchemaEntry>,
}

impl SchemaStore {
    /// Create a store holding only the built-in `_predicate_` entry
    pub fn new() -> Self {
        let entries = DashMap::new();
        entries.insert(
            PREDICATE_ATTR.to_string(),
            SchemaEntry::of(ValueType::String).with_list(),
        );
        Self { entries }
    }

    /// Schema of `attribute`, if declared
    pub fn get(&self, attribute: &str) -> Option<SchemaEntry> {
        self.entries.get(attribute).map(|e| *e.value())
    }

    /// Declare or replace the schema of `attribute`
    pub fn set(&self, attribute: impl Into<String>, entry: SchemaEntry) {
        self.entries.insert(attribute.into(), entry);
    }

    /// Return the schema of `attribute`, registering `default` if absent
    ///
    /// The boolean is true when this call performed the registration.
    pub fn get_or_register(&self, attribute: &str, default: SchemaEntry) -> (SchemaEntry, bool) {
        match self.entries.entry(attribute.to_string()) {
            Entry::Occupied(e) => (*e.get(), false),
            Entry::Vacant(e) => {
                e.insert(default);
                tracing::debug!(attribute, value_type = %default.value_type, "registered default schema");
                (default, true)
            }
        }
    }

    /// Validate `edge` against its attribute's schema
    ///
    /// Entity edges on a scalar attribute and value edges on a `uid`
    /// attribute fail with [`Error::SchemaMismatch`]. Star deletes match any
    /// schema and never trigger registration.
    pub fn check_edge(&self, edge: &DirectedEdge, auto_register: bool) -> Result<Option<SchemaEntry>> {
        let declared = match (&edge.target, auto_register) {
            (EdgeTarget::All, _) | (_, false) => self.get(&edge.attribute),
            (target, true) => Some(
                self.get_or_register(&edge.attribute, SchemaEntry::of(target.value_type()))
                    .0,
            ),
        };

        if let Some(entry) = declared {
            let actual = edge.target.value_type();
            if edge.target != EdgeTarget::All && entry.value_type.is_uid() != actual.is_uid() {
                return Err(Error::SchemaMismatch {
                    attribute: edge.attribute.clone(),
                    expected: entry.value_type.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(declared)
    }

    /// Number of declared attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no attribute is declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::{EntityId, NO_FACETS};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn e(id: u64) -> EntityId {
        EntityId::new(id)
    }

    #[test]
    fn test_builtin_predicate_entry() {
        let schema = SchemaStore::new();
        let entry = schema.get(PREDICATE_ATTR).unwrap();
        assert!(entry.list);
        assert_eq!(entry.value_type, ValueType::String);
    }

    #[test]
    fn test_auto_register_first_edge_type() {
        let schema = SchemaStore::new();
        let edge = DirectedEdge::to_uid("friend", e(1), e(2), NO_FACETS).unwrap();
        let entry = schema.check_edge(&edge, true).unwrap().unwrap();
        assert_eq!(entry.value_type, ValueType::Uid);
        assert_eq!(schema.get("friend"), Some(entry));
    }

    #[test]
    fn test_no_register_when_disabled() {
        let schema = SchemaStore::new();
        let edge = DirectedEdge::to_value("name", e(1), "x", NO_FACETS).unwrap();
        assert_eq!(schema.check_edge(&edge, false).unwrap(), None);
        assert!(schema.get("name").is_none());
    }

    #[test]
    fn test_mismatch_uid_vs_value() {
        let schema = SchemaStore::new();
        schema.set("friend", SchemaEntry::of(ValueType::Uid));
        let edge = DirectedEdge::to_value("friend", e(1), "bob", NO_FACETS).unwrap();
        assert!(matches!(
            schema.check_edge(&edge, true),
            Err(Error::SchemaMismatch { .. })
        ));

        schema.set("name", SchemaEntry::of(ValueType::String));
        let edge = DirectedEdge::to_uid("name", e(1), e(2), NO_FACETS).unwrap();
        assert!(schema.check_edge(&edge, false).is_err());
    }

    #[test]
    fn test_star_delete_matches_any_schema() {
        let schema = SchemaStore::new();
        let star = DirectedEdge::del_all("friend", e(1)).unwrap();
        assert_eq!(schema.check_edge(&star, true).unwrap(), None);
        schema.set("friend", SchemaEntry::of(ValueType::Uid));
        assert!(schema.check_edge(&star, true).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_first_registration_single_winner() {
        let schema = Arc::new(SchemaStore::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let schema = Arc::clone(&schema);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let ty = if i % 2 == 0 { ValueType::Int } else { ValueType::String };
                    barrier.wait();
                    schema.get_or_register("age", SchemaEntry::of(ty))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(_, won)| *won).count(), 1);
        let winner = schema.get("age").unwrap();
        assert!(results.iter().all(|(entry, _)| *entry == winner));
    }
}
