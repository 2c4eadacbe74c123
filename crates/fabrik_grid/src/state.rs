//! The central grid state: cells, machines, connections, belt paths, and
//! tile usage, with grid-scoped id allocation.
//!
//! Entities are stored in ordered maps keyed by id so every iteration the
//! optimizer performs is deterministic. Cells never hold references;
//! machines and connections are looked up through their owning maps, which
//! keeps cloning trivial.

use crate::belt::BeltPath;
use crate::cell::Cell;
use crate::usage::{TileUsage, UsageMap};
use fabrik_geom::{
    input_port_count, machine_ports, output_port_count, Connection, ConnectionId, Direction,
    Machine, MachineId, MachineKind, Port, PortRole,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a connection could not be created.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// One of the endpoint machines does not exist.
    #[error("unknown machine {0}")]
    UnknownMachine(MachineId),
    /// Source and target are the same machine.
    #[error("machine {0} cannot be connected to itself")]
    SelfConnection(MachineId),
    /// The port index exceeds the machine's port count for that role.
    #[error("machine {machine} has no {role:?} port {index}")]
    PortOutOfRange {
        /// The machine whose port was addressed.
        machine: MachineId,
        /// The requested role.
        role: PortRole,
        /// The out-of-range index.
        index: usize,
    },
    /// The port already belongs to another connection.
    #[error("{role:?} port {index} of machine {machine} is already connected")]
    PortInUse {
        /// The machine whose port was addressed.
        machine: MachineId,
        /// The requested role.
        role: PortRole,
        /// The occupied index.
        index: usize,
    },
}

/// The complete state of one layout grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridState {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    machines: BTreeMap<MachineId, Machine>,
    connections: BTreeMap<ConnectionId, Connection>,
    belt_paths: BTreeMap<ConnectionId, BeltPath>,
    usage: UsageMap,
    next_machine_id: u32,
    next_connection_id: u32,
}

impl GridState {
    /// Creates an empty grid of the given dimensions.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![Cell::Empty; (width * height) as usize],
            machines: BTreeMap::new(),
            connections: BTreeMap::new(),
            belt_paths: BTreeMap::new(),
            usage: UsageMap::new(),
            next_machine_id: 0,
            next_connection_id: 0,
        }
    }

    /// Grid width in tiles.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in tiles.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether the tile lies inside the grid.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    fn idx(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    /// Returns the cell at a tile. Out-of-bounds tiles read as empty.
    pub fn cell(&self, x: i32, y: i32) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        if self.in_bounds(x, y) {
            &self.cells[self.idx(x, y)]
        } else {
            &EMPTY
        }
    }

    /// Belt usage at a tile.
    pub fn usage_at(&self, tile: (i32, i32)) -> TileUsage {
        self.usage.at(tile)
    }

    /// The machines map, keyed by id.
    pub fn machines(&self) -> &BTreeMap<MachineId, Machine> {
        &self.machines
    }

    /// The connections map, keyed by id.
    pub fn connections(&self) -> &BTreeMap<ConnectionId, Connection> {
        &self.connections
    }

    /// The routed belt paths, keyed by connection id.
    pub fn belt_paths(&self) -> &BTreeMap<ConnectionId, BeltPath> {
        &self.belt_paths
    }

    /// Looks up a machine.
    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(&id)
    }

    /// Looks up a connection.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Looks up the belt path for a connection.
    pub fn belt_path(&self, id: ConnectionId) -> Option<&BeltPath> {
        self.belt_paths.get(&id)
    }

    // ------------------------------------------------------------------
    // Machines
    // ------------------------------------------------------------------

    /// Places a machine, stamping ownership into every footprint tile.
    ///
    /// Fails (returning `false`, grid unchanged) if any target tile is out
    /// of bounds or already owned by a different machine.
    pub fn place_machine(&mut self, machine: Machine) -> bool {
        let (w, h) = machine.oriented_dims();
        if !self.in_bounds(machine.x, machine.y)
            || !self.in_bounds(machine.x + w - 1, machine.y + h - 1)
        {
            return false;
        }
        for y in machine.y..machine.y + h {
            for x in machine.x..machine.x + w {
                if let Cell::Machine(owner) = &self.cells[self.idx(x, y)] {
                    if *owner != machine.id {
                        return false;
                    }
                }
            }
        }
        for y in machine.y..machine.y + h {
            for x in machine.x..machine.x + w {
                let i = self.idx(x, y);
                self.cells[i] = Cell::Machine(machine.id);
            }
        }
        self.next_machine_id = self.next_machine_id.max(machine.id.as_raw() + 1);
        self.machines.insert(machine.id, machine);
        true
    }

    /// Allocates a fresh id and places a machine of the given kind.
    pub fn add_machine(
        &mut self,
        kind: MachineKind,
        x: i32,
        y: i32,
        orientation: Direction,
    ) -> Option<MachineId> {
        let id = MachineId::from_raw(self.next_machine_id);
        let machine = Machine {
            id,
            kind,
            x,
            y,
            orientation,
        };
        if self.place_machine(machine) {
            Some(id)
        } else {
            None
        }
    }

    /// Removes a machine: clears its cells and cascade-removes every
    /// connection attached to it (together with their belt paths).
    pub fn remove_machine(&mut self, id: MachineId) {
        let Some(machine) = self.machines.remove(&id) else {
            return;
        };
        let (w, h) = machine.oriented_dims();
        for y in machine.y..machine.y + h {
            for x in machine.x..machine.x + w {
                let i = self.idx(x, y);
                if self.cells[i] == Cell::Machine(id) {
                    self.cells[i] = Cell::Empty;
                }
            }
        }
        let attached: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.source == id || c.target == id)
            .map(|c| c.id)
            .collect();
        for conn in attached {
            self.disconnect(conn);
        }
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connects an output port of `source` to an input port of `target`.
    ///
    /// Enforces at construction: both machines exist, no self-connections,
    /// port indices in range, and each (machine, port, role) used by at
    /// most one connection.
    pub fn connect(
        &mut self,
        source: MachineId,
        source_port: usize,
        target: MachineId,
        target_port: usize,
    ) -> Result<ConnectionId, ConnectError> {
        let src = *self
            .machines
            .get(&source)
            .ok_or(ConnectError::UnknownMachine(source))?;
        let tgt = *self
            .machines
            .get(&target)
            .ok_or(ConnectError::UnknownMachine(target))?;
        if source == target {
            return Err(ConnectError::SelfConnection(source));
        }
        if source_port >= output_port_count(&src) {
            return Err(ConnectError::PortOutOfRange {
                machine: source,
                role: PortRole::Output,
                index: source_port,
            });
        }
        if target_port >= input_port_count(&tgt) {
            return Err(ConnectError::PortOutOfRange {
                machine: target,
                role: PortRole::Input,
                index: target_port,
            });
        }
        for conn in self.connections.values() {
            if conn.source == source && conn.source_port == source_port {
                return Err(ConnectError::PortInUse {
                    machine: source,
                    role: PortRole::Output,
                    index: source_port,
                });
            }
            if conn.target == target && conn.target_port == target_port {
                return Err(ConnectError::PortInUse {
                    machine: target,
                    role: PortRole::Input,
                    index: target_port,
                });
            }
        }
        let id = ConnectionId::from_raw(self.next_connection_id);
        self.next_connection_id += 1;
        self.connections.insert(
            id,
            Connection {
                id,
                source,
                source_port,
                target,
                target_port,
            },
        );
        Ok(id)
    }

    /// Inserts a pre-built connection without port-uniqueness re-checks,
    /// bumping the id allocator past it. Used when rebuilding a grid from
    /// a layout that already upheld the uniqueness invariant.
    pub fn insert_connection(&mut self, conn: Connection) {
        self.next_connection_id = self.next_connection_id.max(conn.id.as_raw() + 1);
        self.connections.insert(conn.id, conn);
    }

    /// Removes a connection and its belt path, if any.
    pub fn disconnect(&mut self, id: ConnectionId) {
        self.remove_belt_path(id);
        self.connections.remove(&id);
    }

    /// Resolves a connection's endpoint ports under the machines' current
    /// poses. `None` when an endpoint machine is missing or an index is
    /// stale (degraded handling of a broken invariant).
    pub fn connection_ports(&self, conn: &Connection) -> Option<(Port, Port)> {
        let src = self.machines.get(&conn.source)?;
        let tgt = self.machines.get(&conn.target)?;
        let src_ports = machine_ports(src);
        let tgt_ports = machine_ports(tgt);
        let out = src_ports.outputs.get(conn.source_port).copied()?;
        let inp = tgt_ports.inputs.get(conn.target_port).copied()?;
        Some((out, inp))
    }

    // ------------------------------------------------------------------
    // Belt paths
    // ------------------------------------------------------------------

    /// Lays a routed path onto the grid: each traversed empty cell becomes
    /// a belt cell, the connection id is appended to every belt cell's
    /// list, and tile usage is updated for every segment. Machine tiles on
    /// the path (the delivery tile inside the target port) keep their cell
    /// but still count toward usage.
    pub fn apply_belt_path(&mut self, path: BeltPath) {
        for seg in &path.segments {
            self.usage.add_segment(seg);
            if !self.in_bounds(seg.x, seg.y) {
                continue;
            }
            let i = self.idx(seg.x, seg.y);
            match &mut self.cells[i] {
                cell @ Cell::Empty => *cell = Cell::Belt(vec![path.connection]),
                Cell::Belt(list) => list.push(path.connection),
                Cell::Machine(_) => {}
            }
        }
        self.belt_paths.insert(path.connection, path);
    }

    /// Reverses [`apply_belt_path`]: cells whose belt list becomes empty
    /// revert to empty, usage counts are decremented. No-op when the
    /// connection has no path.
    pub fn remove_belt_path(&mut self, id: ConnectionId) {
        let Some(path) = self.belt_paths.remove(&id) else {
            return;
        };
        for seg in &path.segments {
            self.usage.remove_segment(seg);
            if !self.in_bounds(seg.x, seg.y) {
                continue;
            }
            let i = self.idx(seg.x, seg.y);
            if let Cell::Belt(list) = &mut self.cells[i] {
                list.retain(|&c| c != id);
                if list.is_empty() {
                    self.cells[i] = Cell::Empty;
                }
            }
        }
    }

    /// Removes every belt path, restoring all belt cells to empty.
    pub fn clear_belts(&mut self) {
        let ids: Vec<ConnectionId> = self.belt_paths.keys().copied().collect();
        for id in ids {
            self.remove_belt_path(id);
        }
    }
}
