//! Phase 3: port assignment.
//!
//! Re-pairs each connection onto the cheapest unused port pair, longest
//! connections first, then commits only if the build-and-route comparison
//! says the reassignment is at least as good as the original.

use crate::candidate::Candidate;
use fabrik_geom::machine_ports;
use std::collections::BTreeSet;

/// Greedy re-pair: connections sorted by estimated Manhattan length
/// (longest first), each taking the unused source×target port pair with
/// the smallest Manhattan distance. Port uniqueness is maintained
/// incrementally.
pub fn greedy_reassign(cand: &Candidate) -> Candidate {
    let mut result = cand.clone();
    let mut order: Vec<_> = cand
        .connections
        .values()
        .map(|c| (cand.connection_manhattan(c).unwrap_or(i32::MAX), c.id))
        .collect();
    order.sort_by_key(|&(len, id)| (std::cmp::Reverse(len), id));

    let mut used_outputs: BTreeSet<(fabrik_geom::MachineId, usize)> = BTreeSet::new();
    let mut used_inputs: BTreeSet<(fabrik_geom::MachineId, usize)> = BTreeSet::new();

    for (_, conn_id) in order {
        let conn = result.connections[&conn_id];
        let (Some(src), Some(tgt)) = (
            result.machines.get(&conn.source).copied(),
            result.machines.get(&conn.target).copied(),
        ) else {
            continue;
        };
        let outs = machine_ports(&src).outputs;
        let inps = machine_ports(&tgt).inputs;
        let mut best: Option<(i32, usize, usize)> = None;
        for out in outs.iter().filter(|p| !used_outputs.contains(&(conn.source, p.index))) {
            for inp in inps.iter().filter(|p| !used_inputs.contains(&(conn.target, p.index))) {
                let d = fabrik_geom::manhattan(out.external_tile(), inp.external_tile());
                if best.map(|(b, _, _)| d < b).unwrap_or(true) {
                    best = Some((d, out.index, inp.index));
                }
            }
        }
        let Some((_, out_idx, in_idx)) = best else {
            // No free pair: keep the current indices and pin them.
            used_outputs.insert((conn.source, conn.source_port));
            used_inputs.insert((conn.target, conn.target_port));
            continue;
        };
        used_outputs.insert((conn.source, out_idx));
        used_inputs.insert((conn.target, in_idx));
        let entry = result.connections.get_mut(&conn_id).expect("exists");
        entry.source_port = out_idx;
        entry.target_port = in_idx;
    }
    result
}

/// Greedy re-pair plus the commit rule: build and route both the original
/// and the reassigned layout; take whichever routes to the lower total.
/// If only one routes, take it; if neither routes, compare fast scores.
pub fn refine_ports(cand: &Candidate) -> Candidate {
    let reassigned = greedy_reassign(cand);
    match (cand.routed(), reassigned.routed()) {
        (Some((_, orig)), Some((_, new))) => {
            if new.total < orig.total {
                reassigned
            } else {
                cand.clone()
            }
        }
        (None, Some(_)) => reassigned,
        (Some(_), None) => cand.clone(),
        (None, None) => {
            if reassigned.fast_score().total < cand.fast_score().total {
                reassigned
            } else {
                cand.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_geom::{Direction, MachineKind};
    use fabrik_grid::GridState;

    #[test]
    fn reassignment_shortens_a_bad_pairing() {
        let mut g = GridState::new(20, 20);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 0, 6, Direction::North).unwrap();
        // Deliberately crossed pairing: leftmost output to rightmost input.
        g.connect(a, 0, b, 2).unwrap();
        let base = Candidate::from_grid(&g);
        let before = base
            .connections
            .values()
            .filter_map(|c| base.connection_manhattan(c))
            .sum::<i32>();

        let refined = greedy_reassign(&base);
        let after = refined
            .connections
            .values()
            .filter_map(|c| refined.connection_manhattan(c))
            .sum::<i32>();
        assert!(after < before, "crossed pairing straightened ({after} vs {before})");
    }

    #[test]
    fn reassignment_keeps_ports_unique() {
        let mut g = GridState::new(30, 30);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 0, 6, Direction::North).unwrap();
        let c = g.add_machine(MachineKind::Compact, 6, 6, Direction::North).unwrap();
        g.connect(a, 0, b, 0).unwrap();
        g.connect(a, 1, b, 1).unwrap();
        g.connect(a, 2, c, 0).unwrap();
        let refined = greedy_reassign(&Candidate::from_grid(&g));
        let mut outs = BTreeSet::new();
        let mut ins = BTreeSet::new();
        for conn in refined.connections.values() {
            assert!(outs.insert((conn.source, conn.source_port)));
            assert!(ins.insert((conn.target, conn.target_port)));
        }
    }

    #[test]
    fn commit_rule_never_worsens_the_routed_score() {
        let mut g = GridState::new(20, 20);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 0, 6, Direction::North).unwrap();
        g.connect(a, 1, b, 1).unwrap();
        let base = Candidate::from_grid(&g);
        let baseline = base.routed().unwrap().1.total;
        let refined = refine_ports(&base);
        let total = refined.routed().unwrap().1.total;
        assert!(total <= baseline);
    }
}
