//! Belt segments and paths.

use fabrik_geom::{ConnectionId, Direction};
use serde::{Deserialize, Serialize};

/// One tile of a belt run.
///
/// `from` is the travel direction the belt entered this tile with (`None`
/// only at the path start); `to` is the direction it leaves in (`None`
/// only at the end). Consecutive segments agree: segment *i*'s `to` equals
/// segment *i+1*'s `from` and matches the tile delta between them.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BeltSegment {
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Travel direction on entry, `None` at the path start.
    pub from: Option<Direction>,
    /// Travel direction on exit, `None` at the path end.
    pub to: Option<Direction>,
}

impl BeltSegment {
    /// A segment is a corner iff both directions are set and lie on
    /// different axes.
    pub fn is_corner(&self) -> bool {
        match (self.from, self.to) {
            (Some(f), Some(t)) => f.axis() != t.axis(),
            _ => false,
        }
    }

    /// The travel axis of a straight segment; `None` for a degenerate
    /// segment with neither direction set.
    pub fn axis(&self) -> Option<fabrik_geom::Axis> {
        self.from.or(self.to).map(Direction::axis)
    }

    /// The tile this segment sits on.
    pub fn tile(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// The routed belt for one connection: an ordered run of segments from the
/// tile just outside the source port to the target port's own tile (the
/// delivery step into the machine).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BeltPath {
    /// The connection this belt carries.
    pub connection: ConnectionId,
    /// Segments in travel order.
    pub segments: Vec<BeltSegment>,
}

impl BeltPath {
    /// Total number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Direction changes between consecutive segments: the number of pairs
    /// whose exit directions are both set and differ.
    pub fn corner_count(&self) -> usize {
        self.segments
            .windows(2)
            .filter(|w| match (w[0].to, w[1].to) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x: i32, y: i32, from: Option<Direction>, to: Option<Direction>) -> BeltSegment {
        BeltSegment { x, y, from, to }
    }

    #[test]
    fn corner_requires_axis_change() {
        assert!(seg(0, 0, Some(Direction::East), Some(Direction::North)).is_corner());
        assert!(!seg(0, 0, Some(Direction::East), Some(Direction::East)).is_corner());
        assert!(!seg(0, 0, None, Some(Direction::North)).is_corner());
        assert!(!seg(0, 0, Some(Direction::North), None).is_corner());
    }

    #[test]
    fn straight_path_has_no_corners() {
        let path = BeltPath {
            connection: ConnectionId::from_raw(0),
            segments: vec![
                seg(1, 3, None, Some(Direction::South)),
                seg(1, 4, Some(Direction::South), Some(Direction::South)),
                seg(1, 5, Some(Direction::South), Some(Direction::South)),
                seg(1, 6, Some(Direction::South), None),
            ],
        };
        assert_eq!(path.corner_count(), 0);
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn l_path_has_one_corner() {
        let path = BeltPath {
            connection: ConnectionId::from_raw(0),
            segments: vec![
                seg(0, 0, None, Some(Direction::East)),
                seg(1, 0, Some(Direction::East), Some(Direction::East)),
                seg(2, 0, Some(Direction::East), Some(Direction::South)),
                seg(2, 1, Some(Direction::South), None),
            ],
        };
        assert_eq!(path.corner_count(), 1);
        assert!(path.segments[2].is_corner());
    }
}
