//! Resolved read results
//!
//! A [`PostingList`] is the state of one `(attribute, entity)` key as seen
//! at a read timestamp: the live targets, each with the facets and label of
//! the committed entry that made it live.

use crate::edge::{EdgeTarget, TargetIdentity};
use crate::facet::Facet;
use crate::types::{DataKey, EntityId};

/// One live target
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// Identity within the key
    pub identity: TargetIdentity,
    /// Target value or entity
    pub target: EdgeTarget,
    /// Provenance label of the winning entry
    pub label: Option<String>,
    /// Facets of the winning entry
    pub facets: Vec<Facet>,
    /// Commit timestamp of the winning entry
    pub commit_ts: u64,
}

/// Live targets of one key at one read timestamp, ordered by identity
#[derive(Debug, Clone, PartialEq)]
pub struct PostingList {
    key: DataKey,
    read_ts: u64,
    postings: Vec<Posting>,
}

impl PostingList {
    /// Build from postings; sorts them by identity
    pub fn new(key: DataKey, read_ts: u64, mut postings: Vec<Posting>) -> Self {
        postings.sort_by(|a, b| a.identity.cmp(&b.identity));
        Self {
            key,
            read_ts,
            postings,
        }
    }

    /// Empty result for a key with no log
    pub fn empty(key: DataKey, read_ts: u64) -> Self {
        Self {
            key,
            read_ts,
            postings: Vec::new(),
        }
    }

    /// Key this result belongs to
    pub fn key(&self) -> &DataKey {
        &self.key
    }

    /// Read timestamp this result was resolved at
    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }

    /// Number of live targets
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// True if nothing is live
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Iterate live postings
    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    /// Consume into the posting vector
    pub fn into_postings(self) -> Vec<Posting> {
        self.postings
    }

    /// Target entities, ascending
    pub fn uids(&self) -> Vec<EntityId> {
        self.postings
            .iter()
            .filter_map(|p| match p.target {
                EdgeTarget::Entity(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// The untagged value posting, if any
    pub fn value_posting(&self) -> Option<&Posting> {
        self.postings
            .iter()
            .find(|p| p.target.value_bytes().is_some() && p.target.lang().is_none())
    }

    /// Bytes of the untagged value
    pub fn value(&self) -> Option<&[u8]> {
        self.value_posting().and_then(|p| p.target.value_bytes())
    }

    /// Untagged value as UTF-8, if it is valid UTF-8
    pub fn value_str(&self) -> Option<&str> {
        self.value().and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Value tagged with `lang`
    pub fn value_for_lang(&self, lang: &str) -> Option<&[u8]> {
        self.postings
            .iter()
            .find(|p| p.target.lang() == Some(lang))
            .and_then(|p| p.target.value_bytes())
    }

    /// All literal values, in identity order
    pub fn values(&self) -> Vec<&[u8]> {
        self.postings
            .iter()
            .filter_map(|p| p.target.value_bytes())
            .collect()
    }
}
