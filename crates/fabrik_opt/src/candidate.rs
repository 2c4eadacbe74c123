//! The optimizer's candidate representation: machine poses plus
//! connections, detached from any grid.
//!
//! Fast scoring works directly on the poses (Manhattan proxy); routed
//! scoring rebuilds a grid and invokes the router. Pinned machines are
//! never repositioned; every mutation path goes through [`Candidate::can_place`]
//! so candidates always describe valid, non-overlapping layouts.

use fabrik_geom::{
    machine_ports, Connection, ConnectionId, Machine, MachineId, Port,
};
use fabrik_grid::{evaluate_grid, GridState, ScoreBreakdown};
use fabrik_route::{manhattan_estimate, route_all};
use std::collections::BTreeMap;

/// Penalty floor added to the fast score when a candidate fails to route,
/// keeping unroutable regions strictly worse than any routable layout.
pub const UNROUTABLE_BASE: f64 = 100_000.0;
/// Per-connection component of the unroutable penalty.
pub const UNROUTABLE_PER_CONNECTION: f64 = 500.0;
/// Per-machine component of the unroutable penalty.
pub const UNROUTABLE_PER_MACHINE: f64 = 50.0;

/// A candidate layout under optimization.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Grid width the layout must fit.
    pub width: i32,
    /// Grid height the layout must fit.
    pub height: i32,
    /// Machine poses, keyed by id.
    pub machines: BTreeMap<MachineId, Machine>,
    /// Connections, keyed by id.
    pub connections: BTreeMap<ConnectionId, Connection>,
}

impl Candidate {
    /// Extracts the candidate from a grid state.
    pub fn from_grid(grid: &GridState) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            machines: grid.machines().clone(),
            connections: grid.connections().clone(),
        }
    }

    /// Ids of machines the optimizer may move, in id order.
    pub fn movable_ids(&self) -> Vec<MachineId> {
        self.machines
            .values()
            .filter(|m| m.is_movable())
            .map(|m| m.id)
            .collect()
    }

    /// Whether `pose` fits the grid without overlapping any machine other
    /// than itself.
    pub fn can_place(&self, pose: &Machine) -> bool {
        let (w, h) = pose.oriented_dims();
        if pose.x < 0 || pose.y < 0 || pose.x + w > self.width || pose.y + h > self.height {
            return false;
        }
        self.machines
            .values()
            .all(|other| other.id == pose.id || !other.overlaps(pose))
    }

    /// Resolves a connection's endpoint ports under current poses.
    /// `None` when an endpoint machine is absent (mid destroy-repair).
    pub fn connection_ports(&self, conn: &Connection) -> Option<(Port, Port)> {
        let src = self.machines.get(&conn.source)?;
        let tgt = self.machines.get(&conn.target)?;
        let out = machine_ports(src).outputs.get(conn.source_port).copied()?;
        let inp = machine_ports(tgt).inputs.get(conn.target_port).copied()?;
        Some((out, inp))
    }

    /// Manhattan estimate for one connection; `None` when an endpoint is
    /// absent.
    pub fn connection_manhattan(&self, conn: &Connection) -> Option<i32> {
        let (src, tgt) = self.connection_ports(conn)?;
        Some(manhattan_estimate(&src, &tgt))
    }

    /// Sum of Manhattan estimates over every connection touching `id`,
    /// skipping connections whose other endpoint is absent.
    pub fn machine_cost(&self, id: MachineId) -> i64 {
        self.connections
            .values()
            .filter(|c| c.source == id || c.target == id)
            .filter_map(|c| self.connection_manhattan(c))
            .map(i64::from)
            .sum()
    }

    /// Multigraph neighbor weights of `id`: how many connections run
    /// between it and each other machine.
    pub fn neighbor_weights(&self, id: MachineId) -> BTreeMap<MachineId, usize> {
        let mut weights = BTreeMap::new();
        for conn in self.connections.values() {
            let other = if conn.source == id {
                conn.target
            } else if conn.target == id {
                conn.source
            } else {
                continue;
            };
            *weights.entry(other).or_insert(0) += 1;
        }
        weights
    }

    /// The neighbor connected by the most connections (ties broken by
    /// lowest id).
    pub fn most_connected_neighbor(&self, id: MachineId) -> Option<MachineId> {
        self.neighbor_weights(id)
            .into_iter()
            .max_by_key(|&(other, weight)| (weight, std::cmp::Reverse(other)))
            .map(|(other, _)| other)
    }

    /// Total connection count touching `id`.
    pub fn degree(&self, id: MachineId) -> usize {
        self.connections
            .values()
            .filter(|c| c.source == id || c.target == id)
            .count()
    }

    /// The Manhattan-proxy score: belt lengths from external-tile
    /// distances, a corner proxy counting connections that need at least
    /// one turn, and the bounding box over machines and connection
    /// endpoints.
    pub fn fast_score(&self) -> ScoreBreakdown {
        let mut belts = 0i64;
        let mut corners = 0i64;
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        let mut extend = |x: i32, y: i32, b: &mut Option<(i32, i32, i32, i32)>| {
            *b = Some(match *b {
                None => (x, x, y, y),
                Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
            });
        };

        for m in self.machines.values() {
            let (w, h) = m.oriented_dims();
            extend(m.x, m.y, &mut bounds);
            extend(m.x + w - 1, m.y + h - 1, &mut bounds);
        }
        for conn in self.connections.values() {
            if let Some((src, tgt)) = self.connection_ports(conn) {
                let a = src.external_tile();
                let b = tgt.external_tile();
                belts += i64::from(fabrik_geom::manhattan(a, b));
                if a.0 != b.0 && a.1 != b.1 {
                    corners += 1;
                }
                extend(a.0, a.1, &mut bounds);
                extend(b.0, b.1, &mut bounds);
            }
        }

        let area = match bounds {
            Some((x0, x1, y0, y1)) => ((x1 - x0 + 1) as i64 * (y1 - y0 + 1) as i64) as f64,
            None => 0.0,
        };
        ScoreBreakdown::new(belts as f64, area, corners as f64)
    }

    /// Rebuilds a grid holding this candidate's machines and connections
    /// (no belts). `None` if any machine fails to place, which indicates a
    /// corrupted candidate.
    pub fn build_grid(&self) -> Option<GridState> {
        let mut grid = GridState::new(self.width, self.height);
        for machine in self.machines.values() {
            if !grid.place_machine(*machine) {
                return None;
            }
        }
        for conn in self.connections.values() {
            grid.insert_connection(*conn);
        }
        Some(grid)
    }

    /// Builds and fully routes the candidate. `None` when any connection
    /// fails to route.
    pub fn routed(&self) -> Option<(GridState, ScoreBreakdown)> {
        let mut grid = self.build_grid()?;
        let report = route_all(&mut grid);
        if !report.is_fully_routed() {
            return None;
        }
        let score = evaluate_grid(&grid);
        Some((grid, score))
    }

    /// The routed total when routable, otherwise the fast total plus the
    /// unroutable penalty. Drives Phase 2 acceptance so the search is not
    /// trapped in permanently unroutable regions.
    pub fn routed_cost(&self) -> f64 {
        match self.routed() {
            Some((_, score)) => score.total,
            None => self.fast_score().total + self.unroutable_penalty(),
        }
    }

    /// The penalty term for an unroutable candidate.
    pub fn unroutable_penalty(&self) -> f64 {
        UNROUTABLE_BASE
            + UNROUTABLE_PER_CONNECTION * self.connections.len() as f64
            + UNROUTABLE_PER_MACHINE * self.machines.len() as f64
    }

    /// Canonical pose fingerprint (see `fabrik_layout::fingerprint`).
    pub fn fingerprint(&self) -> String {
        fabrik_layout::fingerprint(self.machines.values())
    }
}
