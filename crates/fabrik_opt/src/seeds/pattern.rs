//! Pattern-aware seed.
//!
//! Recognizes two graph shapes with known good row placements: a clean
//! three-layer bipartite flow (sources → middles → sinks) and a ring of
//! eight or more machines (with chords allowed). Anything else abstains;
//! the other generators cover it.

use crate::candidate::Candidate;
use crate::repair::spiral_pose;
use fabrik_geom::{Machine, MachineId};
use std::collections::{BTreeMap, BTreeSet};

/// Minimum machine count for ring detection.
const RING_MIN: usize = 8;
/// Backtracking budget for the Hamiltonian-cycle probe.
const CYCLE_BUDGET: usize = 20_000;

/// Builds the pattern seed, or abstains with `None`.
pub fn pattern_seed(base: &Candidate) -> Option<Candidate> {
    // Row placement cannot honor pinned poses.
    if base.machines.values().any(|m| !m.is_movable()) {
        return None;
    }
    if base.machines.is_empty() || base.connections.is_empty() {
        return None;
    }
    if let Some(rows) = three_layer_rows(base) {
        return place_rows(base, &rows);
    }
    if let Some(cycle) = ring_order(base) {
        let half = cycle.len().div_ceil(2);
        let top: Vec<MachineId> = cycle[..half].to_vec();
        let mut bottom: Vec<MachineId> = cycle[half..].to_vec();
        bottom.reverse();
        return place_rows(base, &[top, bottom]);
    }
    None
}

/// Splits the machines into clean source/middle/sink rows, or `None` when
/// any connection violates the two-stage flow.
fn three_layer_rows(cand: &Candidate) -> Option<Vec<Vec<MachineId>>> {
    let mut in_deg: BTreeMap<MachineId, usize> = BTreeMap::new();
    let mut out_deg: BTreeMap<MachineId, usize> = BTreeMap::new();
    for conn in cand.connections.values() {
        *out_deg.entry(conn.source).or_insert(0) += 1;
        *in_deg.entry(conn.target).or_insert(0) += 1;
    }
    let class = |id: MachineId| -> u8 {
        let din = in_deg.get(&id).copied().unwrap_or(0);
        let dout = out_deg.get(&id).copied().unwrap_or(0);
        match (din, dout) {
            (0, o) if o > 0 => 0, // source
            (i, 0) if i > 0 => 2, // sink
            (i, o) if i > 0 && o > 0 => 1,
            _ => 3, // isolated
        }
    };
    let mut rows = vec![Vec::new(), Vec::new(), Vec::new()];
    for &id in cand.machines.keys() {
        let c = class(id);
        if c == 3 {
            return None;
        }
        rows[c as usize].push(id);
    }
    if rows.iter().any(|r| r.is_empty()) {
        return None;
    }
    for conn in cand.connections.values() {
        let ok = (class(conn.source) == 0 && class(conn.target) == 1)
            || (class(conn.source) == 1 && class(conn.target) == 2);
        if !ok {
            return None;
        }
    }
    Some(rows)
}

/// Finds a directed cycle visiting every machine once (chords permitted),
/// via bounded backtracking. `None` when no ring exists or the graph is
/// too small.
fn ring_order(cand: &Candidate) -> Option<Vec<MachineId>> {
    let n = cand.machines.len();
    if n < RING_MIN {
        return None;
    }
    let mut successors: BTreeMap<MachineId, Vec<MachineId>> = BTreeMap::new();
    for conn in cand.connections.values() {
        successors.entry(conn.source).or_default().push(conn.target);
    }
    for succ in successors.values_mut() {
        succ.sort();
        succ.dedup();
    }
    // Every machine needs an outgoing edge to close a ring.
    if cand.machines.keys().any(|id| !successors.contains_key(id)) {
        return None;
    }

    let start = *cand.machines.keys().next().expect("nonempty");
    let mut path = vec![start];
    let mut visited: BTreeSet<MachineId> = [start].into();
    let mut budget = CYCLE_BUDGET;
    if extend_cycle(&successors, start, n, &mut path, &mut visited, &mut budget) {
        Some(path)
    } else {
        None
    }
}

fn extend_cycle(
    successors: &BTreeMap<MachineId, Vec<MachineId>>,
    start: MachineId,
    n: usize,
    path: &mut Vec<MachineId>,
    visited: &mut BTreeSet<MachineId>,
    budget: &mut usize,
) -> bool {
    if *budget == 0 {
        return false;
    }
    *budget -= 1;
    let here = *path.last().expect("nonempty");
    let Some(nexts) = successors.get(&here) else {
        return false;
    };
    if path.len() == n {
        return nexts.contains(&start);
    }
    for &next in nexts {
        if visited.contains(&next) {
            continue;
        }
        path.push(next);
        visited.insert(next);
        if extend_cycle(successors, start, n, path, visited, budget) {
            return true;
        }
        path.pop();
        visited.remove(&next);
    }
    false
}

/// Packs the rows left to right, top to bottom, spiral-repairing any pose
/// that does not fit.
fn place_rows(base: &Candidate, rows: &[Vec<MachineId>]) -> Option<Candidate> {
    let mut cand = base.clone();
    let mut originals: BTreeMap<MachineId, Machine> = BTreeMap::new();
    for &id in rows.iter().flatten() {
        if let Some(m) = cand.machines.remove(&id) {
            originals.insert(id, m);
        }
    }

    let mut y = 1;
    for row in rows {
        let mut x = 1;
        let mut row_height = 0;
        for &id in row {
            let original = originals.get(&id).copied()?;
            let desired = Machine { x, y, ..original };
            let pose = if cand.can_place(&desired) {
                desired
            } else {
                spiral_pose(&cand, id, original.kind, x, y)?
            };
            let (w, h) = pose.oriented_dims();
            row_height = row_height.max(h);
            x = (pose.x + w + 2).max(x);
            cand.machines.insert(id, pose);
        }
        y += row_height + 2;
    }
    Some(cand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_geom::{Direction, MachineKind};
    use fabrik_grid::GridState;

    #[test]
    fn three_layer_flow_gets_three_rows() {
        let mut g = GridState::new(60, 60);
        let s0 = g.add_machine(MachineKind::Compact, 40, 40, Direction::North).unwrap();
        let s1 = g.add_machine(MachineKind::Compact, 50, 40, Direction::North).unwrap();
        let m0 = g.add_machine(MachineKind::Compact, 0, 40, Direction::North).unwrap();
        let k0 = g.add_machine(MachineKind::Compact, 40, 0, Direction::North).unwrap();
        g.connect(s0, 0, m0, 0).unwrap();
        g.connect(s1, 0, m0, 1).unwrap();
        g.connect(m0, 0, k0, 0).unwrap();
        let base = Candidate::from_grid(&g);

        let seed = pattern_seed(&base).expect("clean bipartite flow");
        assert!(seed.machines[&s0].y < seed.machines[&m0].y);
        assert!(seed.machines[&m0].y < seed.machines[&k0].y);
    }

    #[test]
    fn abstains_on_messy_graphs() {
        let mut g = GridState::new(40, 40);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 10, 0, Direction::North).unwrap();
        let c = g.add_machine(MachineKind::Compact, 20, 0, Direction::North).unwrap();
        // a feeds b, b feeds c, a also feeds c: c has two stages of input,
        // so the flow is not a clean three-layer split.
        g.connect(a, 0, b, 0).unwrap();
        g.connect(b, 0, c, 0).unwrap();
        g.connect(a, 1, c, 1).unwrap();
        let base = Candidate::from_grid(&g);
        assert!(pattern_seed(&base).is_none());
    }

    #[test]
    fn ring_of_eight_gets_two_rows() {
        let mut g = GridState::new(80, 80);
        let mut ids = Vec::new();
        for i in 0..8 {
            let x = (i % 4) * 12;
            let y = (i / 4) * 12;
            ids.push(
                g.add_machine(MachineKind::Compact, x as i32, y as i32, Direction::North)
                    .unwrap(),
            );
        }
        for i in 0..8 {
            g.connect(ids[i], 0, ids[(i + 1) % 8], 0).unwrap();
        }
        let base = Candidate::from_grid(&g);
        let seed = pattern_seed(&base).expect("ring detected");
        // Two rows: half the ring on top, half below.
        let ys: BTreeSet<i32> = seed.machines.values().map(|m| m.y).collect();
        assert_eq!(ys.len(), 2);
    }

    #[test]
    fn abstains_when_pinned_machines_exist() {
        let mut g = GridState::new(40, 40);
        let anchor = g.add_machine(MachineKind::Anchor, 5, 5, Direction::North).unwrap();
        let a = g.add_machine(MachineKind::Compact, 20, 20, Direction::North).unwrap();
        g.connect(anchor, 0, a, 0).unwrap();
        let base = Candidate::from_grid(&g);
        assert!(pattern_seed(&base).is_none());
    }
}
