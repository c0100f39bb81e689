//! Error types for quiver
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Construction errors (`InvalidFacetValue`, `InvalidFacetKey`,
//! `DuplicateFacetKey`, `InvalidEdge`) are raised before any shared state is
//! touched. Errors on shared state (`UnknownTransaction`, `TimestampsExhausted`,
//! `TransactionNotActive`, `StaleRead`) are always surfaced to the caller.

use thiserror::Error;

/// Result type alias for quiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for quiver
#[derive(Debug, Error)]
pub enum Error {
    /// Commit, abort, or resolve referenced a start timestamp the oracle
    /// never issued, or one that is already committed or aborted
    #[error("Unknown transaction: start_ts {start_ts} is not registered or already resolved")]
    UnknownTransaction {
        /// Start timestamp that was referenced
        start_ts: u64,
    },

    /// The oracle has no timestamp left to issue
    #[error("Timestamps exhausted: last issued {last_issued}")]
    TimestampsExhausted {
        /// Highest timestamp issued so far
        last_issued: u64,
    },

    /// A facet value could not be type-inferred
    #[error("Invalid facet value for key '{key}': {value:?} ({reason})")]
    InvalidFacetValue {
        /// Facet key
        key: String,
        /// Raw facet value
        value: String,
        /// Why inference failed
        reason: String,
    },

    /// A facet key is empty
    #[error("Invalid facet key: facet keys must be non-empty")]
    InvalidFacetKey,

    /// The same facet key appeared twice on one edge
    #[error("Duplicate facet key: '{0}'")]
    DuplicateFacetKey(String),

    /// A read was requested above the oracle's max-assigned timestamp
    #[error("Stale read: read_ts {read_ts} is ahead of max_assigned {max_assigned}")]
    StaleRead {
        /// Requested read timestamp
        read_ts: u64,
        /// Max-assigned timestamp at the time of the request
        max_assigned: u64,
    },

    /// Operation on a transaction that is no longer active
    #[error("Transaction {start_ts} is not active (state: {state})")]
    TransactionNotActive {
        /// Start timestamp of the transaction
        start_ts: u64,
        /// Current state description
        state: String,
    },

    /// Edge kind conflicts with the attribute's declared schema
    #[error("Schema mismatch on '{attribute}': declared {expected}, got {actual}")]
    SchemaMismatch {
        /// Attribute name
        attribute: String,
        /// Declared value type
        expected: String,
        /// Value type carried by the edge
        actual: String,
    },

    /// Structurally invalid edge
    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build an `InvalidFacetValue` error
    pub fn invalid_facet(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidFacetValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Build an `InvalidEdge` error
    pub fn invalid_edge(msg: impl Into<String>) -> Self {
        Error::InvalidEdge(msg.into())
    }

    /// Build a `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// True for errors raised while building edges or facets, before any
    /// shared state was touched
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidFacetValue { .. }
                | Error::InvalidFacetKey
                | Error::DuplicateFacetKey(_)
                | Error::InvalidEdge(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
