//! Core identifier and key types
//!
//! This module defines:
//! - EntityId: opaque 64-bit node identifier
//! - DataKey: (attribute, entity) pair addressing one version log
//! - ValueType: type tag carried by literal edge values
//! - Reserved attribute names

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute holding the predicate-expansion marker edges
pub const PREDICATE_ATTR: &str = "_predicate_";

/// Prefix marking the reverse counterpart of an attribute
pub const REVERSE_PREFIX: char = '~';

/// Highest timestamp the oracle issues or accepts from a delta
///
/// Values above it are reserved; the version log encodes an aborted entry
/// as `u64::MAX`.
pub const MAX_TIMESTAMP: u64 = u64::MAX - 2;

/// Opaque entity identifier
///
/// Entities have no schema; identity only. `0` is never a valid entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        EntityId(id)
    }

    /// Raw id
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for ids usable as an edge endpoint
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Key of one version log
///
/// # Ordering
///
/// Keys are ordered by: attribute → entity, so all facts of one attribute
/// are grouped together.
///
/// # Examples
///
/// ```
/// use quiver_core::{DataKey, EntityId};
///
/// let key = DataKey::new("name", EntityId::new(1));
/// assert_eq!(key.attribute(), "name");
/// assert!(!key.is_reverse());
/// assert!(DataKey::reverse("friend", EntityId::new(2)).is_reverse());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataKey {
    attribute: String,
    entity: EntityId,
}

impl DataKey {
    /// Key for `attribute` on `entity`
    pub fn new(attribute: impl Into<String>, entity: EntityId) -> Self {
        Self {
            attribute: attribute.into(),
            entity,
        }
    }

    /// Key of the reverse log `~attribute` on `entity`
    pub fn reverse(attribute: &str, entity: EntityId) -> Self {
        Self::new(format!("{}{}", REVERSE_PREFIX, attribute), entity)
    }

    /// Attribute name
    #[inline]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Source entity
    #[inline]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// True if this key addresses a reverse log
    pub fn is_reverse(&self) -> bool {
        self.attribute.starts_with(REVERSE_PREFIX)
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.attribute, self.entity)
    }
}

/// Type tag for literal edge values
///
/// `Default` means "untyped": the bytes are interpreted by whatever schema
/// the attribute declares. `Uid` marks entity-to-entity edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    /// Untyped bytes
    Default = 0,
    /// Raw binary
    Binary = 1,
    /// 64-bit signed integer
    Int = 2,
    /// 64-bit float
    Float = 3,
    /// Boolean
    Bool = 4,
    /// Date/time
    DateTime = 5,
    /// Serialized geometry (opaque to the core)
    Geo = 6,
    /// Entity reference
    Uid = 7,
    /// Password hash
    Password = 8,
    /// UTF-8 string
    String = 9,
}

impl ValueType {
    /// Convert to byte representation
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Try to create from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ValueType::Default),
            1 => Some(ValueType::Binary),
            2 => Some(ValueType::Int),
            3 => Some(ValueType::Float),
            4 => Some(ValueType::Bool),
            5 => Some(ValueType::DateTime),
            6 => Some(ValueType::Geo),
            7 => Some(ValueType::Uid),
            8 => Some(ValueType::Password),
            9 => Some(ValueType::String),
            _ => None,
        }
    }

    /// Lowercase name as used in schema listings
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Default => "default",
            ValueType::Binary => "binary",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::DateTime => "datetime",
            ValueType::Geo => "geo",
            ValueType::Uid => "uid",
            ValueType::Password => "password",
            ValueType::String => "string",
        }
    }

    /// True for entity references
    #[inline]
    pub fn is_uid(&self) -> bool {
        matches!(self, ValueType::Uid)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
