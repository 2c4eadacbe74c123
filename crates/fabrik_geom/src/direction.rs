//! Cardinal directions and grid axes.
//!
//! [`Direction`] doubles as machine orientation and as belt travel
//! direction. The grid uses screen coordinates: x grows east, y grows
//! south, so `North` is `(0, -1)`.

use serde::{Deserialize, Serialize};

/// One of the four cardinal directions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards negative y.
    North,
    /// Towards positive x.
    East,
    /// Towards positive y.
    South,
    /// Towards negative x.
    West,
}

/// The axis a direction runs along.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Axis {
    /// East/west.
    Horizontal,
    /// North/south.
    Vertical,
}

impl Direction {
    /// All four directions in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Returns the unit step `(dx, dy)` for this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Returns the opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Returns the axis this direction runs along.
    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::Vertical,
            Direction::East | Direction::West => Axis::Horizontal,
        }
    }

    /// Returns the direction rotated a quarter turn clockwise.
    pub fn rotated_cw(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Returns the exchange-format tag for this direction.
    pub fn tag(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }

    /// Parses an exchange-format tag. Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Direction> {
        match tag {
            "north" => Some(Direction::North),
            "east" => Some(Direction::East),
            "south" => Some(Direction::South),
            "west" => Some(Direction::West),
            _ => None,
        }
    }
}
