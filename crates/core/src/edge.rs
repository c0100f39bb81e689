//! Directed edges and their builders
//!
//! An edge is one proposed fact: `(attribute, entity) -> target` with an
//! operation (set or delete). Builders are pure: they validate inputs and
//! route facets through [`build_facets`], but never touch a version log.
//! Applying an edge is the transaction's job.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::facet::{build_facets, Facet};
use crate::types::{DataKey, EntityId, ValueType, PREDICATE_ATTR, REVERSE_PREFIX};

/// Facet argument for builders that attach none
pub const NO_FACETS: [(&str, &str); 0] = [];

/// Edge operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOp {
    /// Add or replace the target
    Set,
    /// Remove the target
    Del,
}

/// What an edge points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeTarget {
    /// Literal value
    Value {
        /// Raw value bytes
        value: Vec<u8>,
        /// Declared value type
        value_type: ValueType,
        /// Language tag, `None` when untagged
        lang: Option<String>,
    },
    /// Another entity
    Entity(EntityId),
    /// Every target of the key (only valid with [`EdgeOp::Del`])
    All,
}

impl EdgeTarget {
    /// Value type carried by this target
    pub fn value_type(&self) -> ValueType {
        match self {
            EdgeTarget::Value { value_type, .. } => *value_type,
            EdgeTarget::Entity(_) => ValueType::Uid,
            EdgeTarget::All => ValueType::Default,
        }
    }

    /// Raw bytes for value targets
    pub fn value_bytes(&self) -> Option<&[u8]> {
        match self {
            EdgeTarget::Value { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Language tag for value targets
    pub fn lang(&self) -> Option<&str> {
        match self {
            EdgeTarget::Value { lang, .. } => lang.as_deref(),
            _ => None,
        }
    }
}

/// Logical identity of a target within one version log
///
/// Two entries with the same identity compete: the newest committed one
/// decides whether the identity is live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetIdentity {
    /// Entity target
    Entity(EntityId),
    /// Single-valued literal, one per language tag
    Lang(Option<String>),
    /// Multi-valued literal, one per distinct value
    Value(Vec<u8>),
    /// Star delete
    All,
}

/// A proposed fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectedEdge {
    /// Attribute (predicate) name
    pub attribute: String,
    /// Source entity
    pub entity: EntityId,
    /// Set or delete
    pub op: EdgeOp,
    /// Target
    pub target: EdgeTarget,
    /// Provenance tag
    pub label: Option<String>,
    /// Facets, sorted by key
    pub facets: Vec<Facet>,
}

impl DirectedEdge {
    /// Set an untagged string value
    pub fn to_value<I, K, V>(attribute: &str, entity: EntityId, value: &str, facets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::to_lang_value(attribute, entity, value, "", facets)
    }

    /// Set a value with a language tag (`""` for untagged)
    pub fn to_lang_value<I, K, V>(
        attribute: &str,
        entity: EntityId,
        value: &str,
        lang: &str,
        facets: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::build(
            attribute,
            entity,
            EdgeOp::Set,
            EdgeTarget::Value {
                value: value.as_bytes().to_vec(),
                value_type: ValueType::Default,
                lang: lang_tag(lang),
            },
            build_facets(facets)?,
        )
    }

    /// Set a value with an explicit type tag
    pub fn to_typed_value<I, K, V>(
        attribute: &str,
        entity: EntityId,
        value_type: ValueType,
        value: Vec<u8>,
        facets: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if value_type.is_uid() {
            return Err(Error::invalid_edge(
                "uid values must be built with to_uid",
            ));
        }
        Self::build(
            attribute,
            entity,
            EdgeOp::Set,
            EdgeTarget::Value {
                value,
                value_type,
                lang: None,
            },
            build_facets(facets)?,
        )
    }

    /// Set serialized geometry bytes; the core treats them as opaque
    pub fn to_geo<I, K, V>(attribute: &str, entity: EntityId, geometry: Vec<u8>, facets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::to_typed_value(attribute, entity, ValueType::Geo, geometry, facets)
    }

    /// Set an edge to another entity
    pub fn to_uid<I, K, V>(attribute: &str, entity: EntityId, target: EntityId, facets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::build(
            attribute,
            entity,
            EdgeOp::Set,
            EdgeTarget::Entity(target),
            build_facets(facets)?,
        )
    }

    /// Delete the edge to another entity
    pub fn del_to_uid(attribute: &str, entity: EntityId, target: EntityId) -> Result<Self> {
        Self::build(
            attribute,
            entity,
            EdgeOp::Del,
            EdgeTarget::Entity(target),
            Vec::new(),
        )
    }

    /// Delete a (possibly language-tagged) value
    pub fn del_to_lang_value(attribute: &str, entity: EntityId, value: &str, lang: &str) -> Result<Self> {
        Self::build(
            attribute,
            entity,
            EdgeOp::Del,
            EdgeTarget::Value {
                value: value.as_bytes().to_vec(),
                value_type: ValueType::Default,
                lang: lang_tag(lang),
            },
            Vec::new(),
        )
    }

    /// Delete every target of `(attribute, entity)`
    pub fn del_all(attribute: &str, entity: EntityId) -> Result<Self> {
        Self::build(attribute, entity, EdgeOp::Del, EdgeTarget::All, Vec::new())
    }

    /// Marker recording that `entity` has at least one `attribute` edge
    pub fn predicate_marker(attribute: &str, entity: EntityId) -> Result<Self> {
        let edge = Self {
            attribute: PREDICATE_ATTR.to_string(),
            entity,
            op: EdgeOp::Set,
            target: EdgeTarget::Value {
                value: attribute.as_bytes().to_vec(),
                value_type: ValueType::String,
                lang: None,
            },
            label: None,
            facets: Vec::new(),
        };
        edge.validate_shape()?;
        Ok(edge)
    }

    /// Attach a provenance label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Key of the version log this edge is applied to
    pub fn data_key(&self) -> DataKey {
        DataKey::new(self.attribute.clone(), self.entity)
    }

    /// Identity of this edge's target
    ///
    /// `list` selects multi-valued semantics for literal values: every
    /// distinct value is its own identity instead of one per language.
    pub fn identity(&self, list: bool) -> TargetIdentity {
        match &self.target {
            EdgeTarget::Entity(id) => TargetIdentity::Entity(*id),
            EdgeTarget::All => TargetIdentity::All,
            EdgeTarget::Value { value, .. } if list => TargetIdentity::Value(value.clone()),
            EdgeTarget::Value { lang, .. } => TargetIdentity::Lang(lang.clone()),
        }
    }

    /// True for the automatically derived `_predicate_` marker
    pub fn is_predicate_marker(&self) -> bool {
        self.attribute == PREDICATE_ATTR
    }

    fn build(
        attribute: &str,
        entity: EntityId,
        op: EdgeOp,
        target: EdgeTarget,
        facets: Vec<Facet>,
    ) -> Result<Self> {
        if attribute.starts_with(REVERSE_PREFIX) {
            return Err(Error::invalid_edge(format!(
                "attribute '{}' is reserved for reverse edges",
                attribute
            )));
        }
        let edge = Self {
            attribute: attribute.to_string(),
            entity,
            op,
            target,
            label: None,
            facets,
        };
        edge.validate_shape()?;
        Ok(edge)
    }

    /// Structural checks shared by every builder
    pub fn validate_shape(&self) -> Result<()> {
        if self.attribute.is_empty() {
            return Err(Error::invalid_edge("attribute must be non-empty"));
        }
        if !self.entity.is_valid() {
            return Err(Error::invalid_edge("source entity must be non-zero"));
        }
        match &self.target {
            EdgeTarget::Entity(id) if !id.is_valid() => {
                Err(Error::invalid_edge("target entity must be non-zero"))
            }
            EdgeTarget::All if self.op != EdgeOp::Del => {
                Err(Error::invalid_edge("star target is only valid for delete"))
            }
            _ => Ok(()),
        }
    }
}

fn lang_tag(lang: &str) -> Option<String> {
    if lang.is_empty() {
        None
    } else {
        Some(lang.to_string())
    }
}
