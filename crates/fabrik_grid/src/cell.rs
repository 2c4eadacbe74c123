//! Grid cell states.

use fabrik_geom::{ConnectionId, MachineId};
use serde::{Deserialize, Serialize};

/// The contents of one grid tile.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Cell {
    /// Nothing occupies the tile.
    Empty,
    /// The tile belongs to a machine footprint.
    Machine(MachineId),
    /// One or more belts pass through the tile. The list holds every
    /// connection routed across it.
    Belt(Vec<ConnectionId>),
}

impl Cell {
    /// Whether the tile is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Whether the tile belongs to a machine footprint.
    pub fn is_machine(&self) -> bool {
        matches!(self, Cell::Machine(_))
    }

    /// Whether at least one belt passes through the tile.
    pub fn is_belt(&self) -> bool {
        matches!(self, Cell::Belt(_))
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}
