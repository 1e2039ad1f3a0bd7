//! The six fixed regions of the realm.
//!
//! Regions are static reference data: the set never changes at runtime.
//! Per-game control state lives in `World`, indexed by `Region as usize`.

use serde::{Deserialize, Serialize};

/// The number of regions on the map.
pub const REGION_COUNT: usize = 6;

/// A region of the realm.
///
/// The `#[repr(u8)]` attribute enables use as an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Region {
    Capital = 0,
    Northmarch = 1,
    Eastreach = 2,
    Southvale = 3,
    Westmoor = 4,
    Harbor = 5,
}

/// All regions in index order.
pub const ALL_REGIONS: [Region; REGION_COUNT] = [
    Region::Capital,
    Region::Northmarch,
    Region::Eastreach,
    Region::Southvale,
    Region::Westmoor,
    Region::Harbor,
];

impl Region {
    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Region::Capital => "The Capital",
            Region::Northmarch => "Northmarch",
            Region::Eastreach => "Eastreach",
            Region::Southvale => "Southvale",
            Region::Westmoor => "Westmoor",
            Region::Harbor => "The Harbor",
        }
    }

    /// Lower-case slug used by the command notation.
    pub const fn slug(self) -> &'static str {
        match self {
            Region::Capital => "capital",
            Region::Northmarch => "northmarch",
            Region::Eastreach => "eastreach",
            Region::Southvale => "southvale",
            Region::Westmoor => "westmoor",
            Region::Harbor => "harbor",
        }
    }

    /// Parses a region from its slug.
    pub fn from_slug(s: &str) -> Option<Region> {
        ALL_REGIONS.iter().copied().find(|r| r.slug() == s)
    }

    /// Converts an array index back to a region.
    pub fn from_index(idx: usize) -> Option<Region> {
        ALL_REGIONS.get(idx).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_roundtrip() {
        for r in ALL_REGIONS {
            assert_eq!(Region::from_slug(r.slug()), Some(r));
        }
        assert_eq!(Region::from_slug("atlantis"), None);
    }

    #[test]
    fn index_matches_discriminant() {
        for (i, r) in ALL_REGIONS.iter().enumerate() {
            assert_eq!(*r as usize, i);
            assert_eq!(Region::from_index(i), Some(*r));
        }
        assert_eq!(Region::from_index(REGION_COUNT), None);
    }
}
