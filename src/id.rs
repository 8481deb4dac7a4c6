//! Identifier newtypes for labels, chunks and relations
//!
//! - **LabelId**: monotonic per loaded article, shared by a chunk and the
//!   label element(s) rendering it (`data-i`)
//! - **RelationId**: dense and 1-based; renumbered on deletion so the ids in
//!   use are always `1..=K`
//! - **StorageKey**: plugin storage key (`l<label>` / `r<relation>`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// LabelId
// =============================================================================

/// Identifier of a marked chunk and its label element(s)
///
/// The same value is written to the `data-i` attribute of every label
/// fragment, so a label split by an overlapping span stays one label.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct LabelId(pub(crate) u32);

impl LabelId {
    /// Create a LabelId from a raw value
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 representation
    #[inline]
    pub const fn as_raw(&self) -> u32 {
        self.0
    }

    /// Value for the `data-i` attribute
    #[inline]
    pub fn to_attr_value(self) -> String {
        self.0.to_string()
    }

    /// Next id in sequence
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelId({})", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LabelId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Chunks are addressed by the id of the label they produced.
pub type ChunkId = LabelId;

// =============================================================================
// RelationId
// =============================================================================

/// Dense, 1-based relation identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct RelationId(pub(crate) u32);

impl RelationId {
    /// First relation id
    pub const FIRST: Self = Self(1);

    /// Create a RelationId from a raw value
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 representation
    #[inline]
    pub const fn as_raw(&self) -> u32 {
        self.0
    }

    /// Id for a slot index in a dense relation list
    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// Slot index in a dense relation list
    #[inline]
    pub(crate) const fn index(&self) -> usize {
        self.0.wrapping_sub(1) as usize
    }
}

impl fmt::Debug for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationId({})", self.0)
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// StorageKey
// =============================================================================

/// Key under which plugins store per-label and per-relation values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Label(LabelId),
    Relation(RelationId),
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(id) => write!(f, "l{}", id),
            Self::Relation(id) => write!(f, "r{}", id),
        }
    }
}

impl FromStr for StorageKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let prefix = chars.next();
        let raw: u32 = chars
            .as_str()
            .parse()
            .map_err(|_| format!("invalid storage key: {s}"))?;
        match prefix {
            Some('l') => Ok(Self::Label(LabelId(raw))),
            Some('r') if raw > 0 => Ok(Self::Relation(RelationId(raw))),
            _ => Err(format!("invalid storage key: {s}")),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_id_attr_roundtrip() {
        let id = LabelId::from_raw(42);
        assert_eq!(id.to_attr_value(), "42");
        assert_eq!("42".parse::<LabelId>().unwrap(), id);
        assert_eq!(id.next().as_raw(), 43);
    }

    #[test]
    fn test_relation_id_is_one_based() {
        assert_eq!(RelationId::from_index(0), RelationId::FIRST);
        assert_eq!(RelationId::from_raw(3).index(), 2);
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(StorageKey::Label(LabelId(7)).to_string(), "l7");
        assert_eq!(StorageKey::Relation(RelationId(2)).to_string(), "r2");
        assert_eq!("r2".parse::<StorageKey>(), Ok(StorageKey::Relation(RelationId(2))));
        assert!("r0".parse::<StorageKey>().is_err());
        assert!("x1".parse::<StorageKey>().is_err());
    }
}
