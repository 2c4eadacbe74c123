//! The versioned JSON layout exchange format.
//!
//! Carries machines (id, kind tag, pose) and connections (id, endpoint
//! machine ids, port indices) plus the square grid size. Import validates
//! strictly: unknown tags, duplicate ids, dangling endpoints, out-of-range
//! ports, and invalid placements are all rejected. The legacy `"5x3"` kind
//! tag is migrated to `"6x4"` on input and never emitted.

use fabrik_geom::{Connection, ConnectionId, Direction, Machine, MachineId, MachineKind};
use fabrik_grid::GridState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The exchange format version this crate reads and writes.
pub const FORMAT_VERSION: u32 = 1;

/// Why a layout file was rejected on import.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The file declares a version this crate does not understand.
    #[error("unsupported layout version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    /// The grid size is not positive.
    #[error("invalid grid size {0}")]
    InvalidGridSize(i32),
    /// A machine entry used a kind tag this crate does not know.
    #[error("unknown machine type tag {0:?}")]
    UnknownKindTag(String),
    /// A machine entry used an orientation tag this crate does not know.
    #[error("unknown orientation tag {0:?}")]
    UnknownOrientationTag(String),
    /// Two machine entries share an id.
    #[error("duplicate machine id {0}")]
    DuplicateMachineId(MachineId),
    /// Two connection entries share an id.
    #[error("duplicate connection id {0}")]
    DuplicateConnectionId(ConnectionId),
    /// A connection references a machine the file does not define.
    #[error("connection {connection} references unknown machine {machine}")]
    DanglingEndpoint {
        /// The offending connection.
        connection: ConnectionId,
        /// The missing machine.
        machine: MachineId,
    },
    /// A connection endpoint is invalid (self-connection, port out of
    /// range, or port already in use).
    #[error("connection {connection}: {reason}")]
    InvalidConnection {
        /// The offending connection.
        connection: ConnectionId,
        /// Human-readable rejection reason.
        reason: String,
    },
    /// A machine does not fit the grid or overlaps another machine.
    #[error("machine {0} cannot be placed")]
    InvalidPlacement(MachineId),
    /// The document is not valid layout JSON at all.
    #[error("malformed layout JSON: {0}")]
    Malformed(String),
}

/// One machine entry in the exchange file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MachineEntry {
    /// Machine id.
    pub id: u32,
    /// Kind tag (`"3x3"`, `"5x5"`, `"6x4"`, `"anchor"`; `"5x3"` accepted
    /// as a legacy alias for `"6x4"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Top-left x.
    pub x: i32,
    /// Top-left y.
    pub y: i32,
    /// Orientation tag (`"north"`, `"east"`, `"south"`, `"west"`).
    pub orientation: String,
}

/// One connection entry in the exchange file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionEntry {
    /// Connection id.
    pub id: u32,
    /// Source machine id.
    pub source: u32,
    /// Output-port index on the source machine.
    pub source_port: usize,
    /// Target machine id.
    pub target: u32,
    /// Input-port index on the target machine.
    pub target_port: usize,
}

/// A complete layout exchange file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutFile {
    /// Format version; always [`FORMAT_VERSION`] on export.
    pub version: u32,
    /// Side length of the square grid.
    pub grid_size: i32,
    /// All machines.
    pub machines: Vec<MachineEntry>,
    /// All connections.
    pub connections: Vec<ConnectionEntry>,
}

impl LayoutFile {
    /// Captures a grid's machines and connections.
    pub fn from_grid(grid: &GridState) -> Self {
        Self {
            version: FORMAT_VERSION,
            grid_size: grid.width().max(grid.height()),
            machines: grid
                .machines()
                .values()
                .map(|m| MachineEntry {
                    id: m.id.as_raw(),
                    kind: m.kind.tag().to_string(),
                    x: m.x,
                    y: m.y,
                    orientation: m.orientation.tag().to_string(),
                })
                .collect(),
            connections: grid
                .connections()
                .values()
                .map(|c| ConnectionEntry {
                    id: c.id.as_raw(),
                    source: c.source.as_raw(),
                    source_port: c.source_port,
                    target: c.target.as_raw(),
                    target_port: c.target_port,
                })
                .collect(),
        }
    }

    /// Validates the file and rebuilds a grid from it. Belt paths are not
    /// part of the format; callers route the result if they need scores.
    pub fn to_grid(&self) -> Result<GridState, LayoutError> {
        if self.version != FORMAT_VERSION {
            return Err(LayoutError::UnsupportedVersion(self.version));
        }
        if self.grid_size <= 0 {
            return Err(LayoutError::InvalidGridSize(self.grid_size));
        }

        let mut grid = GridState::new(self.grid_size, self.grid_size);
        let mut machines: BTreeMap<MachineId, Machine> = BTreeMap::new();
        for entry in &self.machines {
            let id = MachineId::from_raw(entry.id);
            let kind = MachineKind::from_tag(&entry.kind)
                .ok_or_else(|| LayoutError::UnknownKindTag(entry.kind.clone()))?;
            let orientation = Direction::from_tag(&entry.orientation)
                .ok_or_else(|| LayoutError::UnknownOrientationTag(entry.orientation.clone()))?;
            let machine = Machine {
                id,
                kind,
                x: entry.x,
                y: entry.y,
                orientation,
            };
            if machines.insert(id, machine).is_some() {
                return Err(LayoutError::DuplicateMachineId(id));
            }
            if !grid.place_machine(machine) {
                return Err(LayoutError::InvalidPlacement(id));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.connections {
            let id = ConnectionId::from_raw(entry.id);
            if !seen.insert(id) {
                return Err(LayoutError::DuplicateConnectionId(id));
            }
            let source = MachineId::from_raw(entry.source);
            let target = MachineId::from_raw(entry.target);
            for machine in [source, target] {
                if !machines.contains_key(&machine) {
                    return Err(LayoutError::DanglingEndpoint {
                        connection: id,
                        machine,
                    });
                }
            }
            // Re-validate through the grid's construction rules, then remap
            // to the file's connection id so round-trips are exact.
            let fresh = grid
                .connect(source, entry.source_port, target, entry.target_port)
                .map_err(|e| LayoutError::InvalidConnection {
                    connection: id,
                    reason: e.to_string(),
                })?;
            let conn = *grid.connection(fresh).expect("just created");
            grid.disconnect(fresh);
            grid.insert_connection(Connection { id, ..conn });
        }

        Ok(grid)
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("layout file serializes")
    }

    /// Parses from JSON, mapping malformed documents to a rejection.
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        serde_json::from_str(json).map_err(|e| LayoutError::Malformed(e.to_string()))
    }
}
