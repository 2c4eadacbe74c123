//! Per-tile belt usage accounting.
//!
//! Each tile carrying belts tracks how many straight horizontal runs,
//! straight vertical runs, and corners sit on it. Two belts may share a
//! tile only when neither is a corner there and they run on orthogonal
//! axes; the router consults these counts to enforce that. Counts never go
//! negative and a tile whose counts are all zero is absent from the map.

use crate::belt::BeltSegment;
use fabrik_geom::Axis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Belt usage counts for one tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct TileUsage {
    /// Straight segments running east/west.
    pub horizontal: u32,
    /// Straight segments running north/south.
    pub vertical: u32,
    /// Corner segments.
    pub corner: u32,
}

impl TileUsage {
    /// Whether no belt touches the tile.
    pub fn is_zero(&self) -> bool {
        self.horizontal == 0 && self.vertical == 0 && self.corner == 0
    }

    /// Whether any belt touches the tile.
    pub fn any(&self) -> bool {
        !self.is_zero()
    }

    /// The straight-run count along the given axis.
    pub fn along(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Horizontal => self.horizontal,
            Axis::Vertical => self.vertical,
        }
    }

    /// Subtracts `other`, saturating at zero. Underflow indicates a
    /// bookkeeping bug; debug builds assert.
    pub fn saturating_sub(&self, other: &TileUsage) -> TileUsage {
        debug_assert!(
            self.horizontal >= other.horizontal
                && self.vertical >= other.vertical
                && self.corner >= other.corner,
            "tile usage underflow"
        );
        TileUsage {
            horizontal: self.horizontal.saturating_sub(other.horizontal),
            vertical: self.vertical.saturating_sub(other.vertical),
            corner: self.corner.saturating_sub(other.corner),
        }
    }
}

/// Maps tiles to their belt usage counts.
///
/// Serialized as a sorted entry list: JSON maps cannot key on tile pairs.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(
    from = "Vec<((i32, i32), TileUsage)>",
    into = "Vec<((i32, i32), TileUsage)>"
)]
pub struct UsageMap {
    map: HashMap<(i32, i32), TileUsage>,
}

impl From<Vec<((i32, i32), TileUsage)>> for UsageMap {
    fn from(entries: Vec<((i32, i32), TileUsage)>) -> Self {
        Self {
            map: entries.into_iter().filter(|(_, u)| u.any()).collect(),
        }
    }
}

impl From<UsageMap> for Vec<((i32, i32), TileUsage)> {
    fn from(usage: UsageMap) -> Self {
        let mut entries: Vec<_> = usage.map.into_iter().collect();
        entries.sort_by_key(|(tile, _)| *tile);
        entries
    }
}

impl UsageMap {
    /// Creates an empty usage map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the usage for a tile (zero when untouched).
    pub fn at(&self, tile: (i32, i32)) -> TileUsage {
        self.map.get(&tile).copied().unwrap_or_default()
    }

    /// Number of tiles with any usage.
    pub fn occupied_tiles(&self) -> usize {
        self.map.len()
    }

    /// Records one belt segment.
    pub fn add_segment(&mut self, seg: &BeltSegment) {
        let entry = self.map.entry(seg.tile()).or_default();
        if seg.is_corner() {
            entry.corner += 1;
        } else {
            match seg.axis() {
                Some(Axis::Horizontal) => entry.horizontal += 1,
                Some(Axis::Vertical) => entry.vertical += 1,
                None => {}
            }
        }
    }

    /// Removes one belt segment, dropping the tile entry when all counts
    /// reach zero. Removing a segment that was never added is a bug;
    /// debug builds assert, release builds saturate.
    pub fn remove_segment(&mut self, seg: &BeltSegment) {
        let Some(entry) = self.map.get_mut(&seg.tile()) else {
            debug_assert!(false, "removing segment from untracked tile {:?}", seg.tile());
            return;
        };
        if seg.is_corner() {
            debug_assert!(entry.corner > 0, "corner count underflow");
            entry.corner = entry.corner.saturating_sub(1);
        } else {
            match seg.axis() {
                Some(Axis::Horizontal) => {
                    debug_assert!(entry.horizontal > 0, "horizontal count underflow");
                    entry.horizontal = entry.horizontal.saturating_sub(1);
                }
                Some(Axis::Vertical) => {
                    debug_assert!(entry.vertical > 0, "vertical count underflow");
                    entry.vertical = entry.vertical.saturating_sub(1);
                }
                None => {}
            }
        }
        if entry.is_zero() {
            self.map.remove(&seg.tile());
        }
    }

    /// Iterates over tiles with nonzero usage.
    pub fn iter(&self) -> impl Iterator<Item = (&(i32, i32), &TileUsage)> {
        self.map.iter()
    }
}
