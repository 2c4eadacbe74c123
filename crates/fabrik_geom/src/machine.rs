//! Machine kinds, footprints, and placed machine instances.

use crate::direction::Direction;
use crate::ids::MachineId;
use serde::{Deserialize, Serialize};

/// The kind of a machine, fixing its base footprint and port counts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    /// 3×3 general-purpose machine.
    Compact,
    /// 5×5 heavy machine.
    Heavy,
    /// 6×4 wide machine.
    Wide,
    /// 3×1 pinned anchor: a single centered output, no inputs, and an
    /// immovable pose.
    Anchor,
}

impl MachineKind {
    /// Every machine kind.
    pub const ALL: [MachineKind; 4] = [
        MachineKind::Compact,
        MachineKind::Heavy,
        MachineKind::Wide,
        MachineKind::Anchor,
    ];

    /// Returns the base `(width, height)` footprint for north/south
    /// orientations. East/west orientations swap the two.
    pub fn base_dims(self) -> (i32, i32) {
        match self {
            MachineKind::Compact => (3, 3),
            MachineKind::Heavy => (5, 5),
            MachineKind::Wide => (6, 4),
            MachineKind::Anchor => (3, 1),
        }
    }

    /// Whether machines of this kind are pinned: position and orientation
    /// must be preserved across every transformation.
    pub fn is_fixed(self) -> bool {
        matches!(self, MachineKind::Anchor)
    }

    /// Returns the exchange-format tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            MachineKind::Compact => "3x3",
            MachineKind::Heavy => "5x5",
            MachineKind::Wide => "6x4",
            MachineKind::Anchor => "anchor",
        }
    }

    /// Parses an exchange-format tag, including the legacy `"5x3"` alias
    /// for the wide kind (kept verbatim from the original import path).
    pub fn from_tag(tag: &str) -> Option<MachineKind> {
        match tag {
            "3x3" => Some(MachineKind::Compact),
            "5x5" => Some(MachineKind::Heavy),
            "6x4" | "5x3" => Some(MachineKind::Wide),
            "anchor" => Some(MachineKind::Anchor),
            _ => None,
        }
    }
}

/// A machine placed on the grid.
///
/// `(x, y)` is the top-left tile of the oriented footprint. The occupied
/// rectangle must lie wholly inside the grid.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Machine {
    /// The unique ID of this machine.
    pub id: MachineId,
    /// The machine kind (fixes footprint and port counts).
    pub kind: MachineKind,
    /// Top-left x coordinate.
    pub x: i32,
    /// Top-left y coordinate.
    pub y: i32,
    /// The cardinal direction the machine faces. Inputs sit on this face.
    pub orientation: Direction,
}

impl Machine {
    /// Returns the oriented `(width, height)`: north/south keep the base
    /// dims, east/west swap them.
    pub fn oriented_dims(&self) -> (i32, i32) {
        let (w, h) = self.kind.base_dims();
        match self.orientation {
            Direction::North | Direction::South => (w, h),
            Direction::East | Direction::West => (h, w),
        }
    }

    /// Whether this machine may be moved or rotated by the optimizer.
    pub fn is_movable(&self) -> bool {
        !self.kind.is_fixed()
    }

    /// Returns whether the tile lies inside the oriented footprint.
    pub fn occupies(&self, x: i32, y: i32) -> bool {
        let (w, h) = self.oriented_dims();
        x >= self.x && x < self.x + w && y >= self.y && y < self.y + h
    }

    /// Returns whether this machine's footprint intersects `other`'s.
    pub fn overlaps(&self, other: &Machine) -> bool {
        let (w, h) = self.oriented_dims();
        let (ow, oh) = other.oriented_dims();
        self.x < other.x + ow && other.x < self.x + w && self.y < other.y + oh && other.y < self.y + h
    }
}
