//! Core types and traits for quiver
//!
//! This crate defines the foundational types used throughout the system:
//! - EntityId, DataKey: identity and addressing
//! - ValueType: type tags for literal values
//! - Facet, FacetValue: typed edge metadata and its inference
//! - DirectedEdge: proposed facts and their builders
//! - PostingList: resolved read results
//! - Error: error type hierarchy
//! - SnapshotView: read seam for query executors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod edge;
pub mod error;
pub mod facet;
pub mod posting;
pub mod traits;
pub mod types;

pub use edge::{DirectedEdge, EdgeOp, EdgeTarget, TargetIdentity, NO_FACETS};
pub use error::{Error, Result};
pub use facet::{build_facets, encode_facets, Facet, FacetValue};
pub use posting::{Posting, PostingList};
pub use traits::SnapshotView;
pub use types::{DataKey, EntityId, ValueType, MAX_TIMESTAMP, PREDICATE_ATTR, REVERSE_PREFIX};
