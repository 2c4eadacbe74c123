//! The move-operator portfolio.
//!
//! Ten local moves over candidate layouts: eight small perturbations plus
//! two disruptive large moves (cluster destroy-repair and critical-net
//! focus). Every operator validates placements before committing and
//! leaves the candidate untouched when it cannot produce a change; pinned
//! machines are never moved or rotated.

use crate::candidate::Candidate;
use crate::config::OptimizerConfig;
use crate::repair::{
    best_reinsertion_pose, destroy_repair_beam, pose_cost, select_cluster, side_poses,
};
use crate::rng::Lcg32;
use fabrik_geom::{Direction, Machine, MachineId};

/// A move operator in the portfolio.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum MoveOp {
    /// Nudge a machine 1–3 tiles toward its most-connected neighbor.
    MoveTowardNeighbor,
    /// Nudge a machine toward the centroid of its input sources.
    MoveToSource,
    /// Teleport a machine to the best side-of-neighbor pose.
    PortFacingJump,
    /// Re-pair one connection onto the cheapest unused port pair.
    TryDifferentPort,
    /// Shift a machine 1–3 tiles in a random direction.
    RandomShift,
    /// Swap the positions of two movable machines.
    SwapPositions,
    /// Keep the cheapest of the four orientations for one machine.
    RotateBest,
    /// Small random shift combined with a random rotation.
    JointMoveRotate,
    /// Remove a connected cluster and reinsert it via repair placement.
    ClusterDestroyRepair,
    /// Destroy-repair focused on the endpoints of a painful connection.
    CriticalNetFocus,
}

impl MoveOp {
    /// All operators, in dispatch order.
    pub const ALL: [MoveOp; 10] = [
        MoveOp::MoveTowardNeighbor,
        MoveOp::MoveToSource,
        MoveOp::PortFacingJump,
        MoveOp::TryDifferentPort,
        MoveOp::RandomShift,
        MoveOp::SwapPositions,
        MoveOp::RotateBest,
        MoveOp::JointMoveRotate,
        MoveOp::ClusterDestroyRepair,
        MoveOp::CriticalNetFocus,
    ];

    /// Stable index into per-operator tables.
    pub fn index(self) -> usize {
        MoveOp::ALL.iter().position(|&op| op == self).expect("listed")
    }

    /// Whether the operator is a disruptive large move sharing the
    /// temperature-gated budget.
    pub fn is_large(self) -> bool {
        matches!(self, MoveOp::ClusterDestroyRepair | MoveOp::CriticalNetFocus)
    }

    /// Base dispatch weight (tuned defaults; the adaptive layer reshapes
    /// these from observed gains).
    pub fn base_weight(self) -> f64 {
        match self {
            MoveOp::MoveTowardNeighbor => 1.0,
            MoveOp::MoveToSource => 0.8,
            MoveOp::PortFacingJump => 0.7,
            MoveOp::TryDifferentPort => 0.6,
            MoveOp::RandomShift => 1.0,
            MoveOp::SwapPositions => 0.6,
            MoveOp::RotateBest => 0.6,
            MoveOp::JointMoveRotate => 0.5,
            MoveOp::ClusterDestroyRepair => 1.0,
            MoveOp::CriticalNetFocus => 1.0,
        }
    }

    /// Minimum probability floor under the adaptive schedule.
    pub fn min_prob(self) -> f64 {
        if self.is_large() {
            0.0
        } else {
            0.015
        }
    }
}

/// Applies an operator. Returns whether the candidate changed.
pub fn apply_operator(
    op: MoveOp,
    cand: &mut Candidate,
    rng: &mut Lcg32,
    cfg: &OptimizerConfig,
) -> bool {
    match op {
        MoveOp::MoveTowardNeighbor => move_toward_neighbor(cand, rng),
        MoveOp::MoveToSource => move_to_source(cand, rng),
        MoveOp::PortFacingJump => port_facing_jump(cand, rng),
        MoveOp::TryDifferentPort => try_different_port(cand, rng),
        MoveOp::RandomShift => random_shift(cand, rng),
        MoveOp::SwapPositions => swap_positions(cand, rng),
        MoveOp::RotateBest => rotate_best(cand, rng),
        MoveOp::JointMoveRotate => joint_move_rotate(cand, rng),
        MoveOp::ClusterDestroyRepair => cluster_destroy_repair(cand, rng, cfg),
        MoveOp::CriticalNetFocus => critical_net_focus(cand, rng, cfg),
    }
}

fn random_movable(cand: &Candidate, rng: &mut Lcg32) -> Option<MachineId> {
    let movable = cand.movable_ids();
    rng.pick(&movable).copied()
}

fn commit_pose(cand: &mut Candidate, pose: Machine) -> bool {
    let current = cand.machines[&pose.id];
    if pose == current || !cand.can_place(&pose) {
        return false;
    }
    cand.machines.insert(pose.id, pose);
    true
}

fn move_toward_neighbor(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let Some(id) = random_movable(cand, rng) else { return false };
    let Some(neighbor) = cand.most_connected_neighbor(id) else { return false };
    let m = cand.machines[&id];
    let n = cand.machines[&neighbor];
    let step = rng.range_i32(1, 3);
    let dx = (n.x - m.x).signum() * step.min((n.x - m.x).abs());
    let dy = (n.y - m.y).signum() * step.min((n.y - m.y).abs());
    if dx == 0 && dy == 0 {
        return false;
    }
    let (w, h) = m.oriented_dims();
    let pose = Machine {
        x: (m.x + dx).clamp(0, cand.width - w),
        y: (m.y + dy).clamp(0, cand.height - h),
        ..m
    };
    commit_pose(cand, pose)
}

fn move_to_source(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let Some(id) = random_movable(cand, rng) else { return false };
    let sources: Vec<Machine> = cand
        .connections
        .values()
        .filter(|c| c.target == id)
        .filter_map(|c| cand.machines.get(&c.source).copied())
        .collect();
    if sources.is_empty() {
        return false;
    }
    let m = cand.machines[&id];
    let cx = sources.iter().map(|s| s.x).sum::<i32>() / sources.len() as i32;
    let cy = sources.iter().map(|s| s.y).sum::<i32>() / sources.len() as i32;
    let (dx, dy) = (cx - m.x, cy - m.y);
    if dx == 0 && dy == 0 {
        return false;
    }
    // Majority step on the dominant axis, a smaller step on the other.
    let (step_x, step_y) = if dx.abs() >= dy.abs() {
        (dx.signum() * 2.min(dx.abs()), dy.signum() * 1.min(dy.abs()))
    } else {
        (dx.signum() * 1.min(dx.abs()), dy.signum() * 2.min(dy.abs()))
    };
    let (w, h) = m.oriented_dims();
    let pose = Machine {
        x: (m.x + step_x).clamp(0, cand.width - w),
        y: (m.y + step_y).clamp(0, cand.height - h),
        ..m
    };
    commit_pose(cand, pose)
}

fn port_facing_jump(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let Some(id) = random_movable(cand, rng) else { return false };
    let Some(neighbor) = cand.most_connected_neighbor(id) else { return false };
    let anchor = cand.machines[&neighbor];
    let current = cand.machines[&id];
    let best = side_poses(id, current.kind, &anchor)
        .into_iter()
        .filter(|pose| cand.can_place(pose))
        .map(|pose| (pose_cost(cand, &pose), pose))
        .min_by_key(|(cost, _)| *cost);
    match best {
        Some((_, pose)) => commit_pose(cand, pose),
        None => false,
    }
}

fn try_different_port(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let ids: Vec<_> = cand.connections.keys().copied().collect();
    let Some(&conn_id) = rng.pick(&ids) else { return false };
    let conn = cand.connections[&conn_id];
    let Some(src) = cand.machines.get(&conn.source).copied() else { return false };
    let Some(tgt) = cand.machines.get(&conn.target).copied() else { return false };

    let used_outputs: Vec<usize> = cand
        .connections
        .values()
        .filter(|c| c.id != conn_id && c.source == conn.source)
        .map(|c| c.source_port)
        .collect();
    let used_inputs: Vec<usize> = cand
        .connections
        .values()
        .filter(|c| c.id != conn_id && c.target == conn.target)
        .map(|c| c.target_port)
        .collect();

    let outs = fabrik_geom::machine_ports(&src).outputs;
    let inps = fabrik_geom::machine_ports(&tgt).inputs;
    let mut best: Option<(i32, usize, usize)> = None;
    for out in outs.iter().filter(|p| !used_outputs.contains(&p.index)) {
        for inp in inps.iter().filter(|p| !used_inputs.contains(&p.index)) {
            let d = fabrik_geom::manhattan(out.external_tile(), inp.external_tile());
            if best.map(|(b, _, _)| d < b).unwrap_or(true) {
                best = Some((d, out.index, inp.index));
            }
        }
    }
    match best {
        Some((_, out_idx, in_idx))
            if out_idx != conn.source_port || in_idx != conn.target_port =>
        {
            let entry = cand.connections.get_mut(&conn_id).expect("exists");
            entry.source_port = out_idx;
            entry.target_port = in_idx;
            true
        }
        _ => false,
    }
}

fn random_shift(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let Some(id) = random_movable(cand, rng) else { return false };
    let m = cand.machines[&id];
    let dir = *rng.pick(&Direction::ALL).expect("nonempty");
    let step = rng.range_i32(1, 3);
    let (dx, dy) = dir.delta();
    let pose = Machine {
        x: m.x + dx * step,
        y: m.y + dy * step,
        ..m
    };
    commit_pose(cand, pose)
}

fn swap_positions(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let movable = cand.movable_ids();
    if movable.len() < 2 {
        return false;
    }
    let a = movable[rng.index(movable.len())];
    let b = movable[rng.index(movable.len())];
    if a == b {
        return false;
    }
    let ma = cand.machines[&a];
    let mb = cand.machines[&b];
    let pose_a = Machine { x: mb.x, y: mb.y, ..ma };
    let pose_b = Machine { x: ma.x, y: ma.y, ..mb };
    // Validate both against the layout with the pair already swapped.
    let mut probe = cand.clone();
    probe.machines.insert(a, pose_a);
    probe.machines.insert(b, pose_b);
    if probe.can_place(&pose_a) && probe.can_place(&pose_b) {
        *cand = probe;
        true
    } else {
        false
    }
}

fn rotate_best(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let Some(id) = random_movable(cand, rng) else { return false };
    let m = cand.machines[&id];
    let best = Direction::ALL
        .iter()
        .map(|&orientation| Machine { orientation, ..m })
        .filter(|pose| cand.can_place(pose))
        .map(|pose| (pose_cost(cand, &pose), pose))
        .min_by_key(|(cost, _)| *cost);
    match best {
        Some((_, pose)) => commit_pose(cand, pose),
        None => false,
    }
}

fn joint_move_rotate(cand: &mut Candidate, rng: &mut Lcg32) -> bool {
    let Some(id) = random_movable(cand, rng) else { return false };
    let m = cand.machines[&id];
    let dir = *rng.pick(&Direction::ALL).expect("nonempty");
    let step = rng.range_i32(1, 2);
    let (dx, dy) = dir.delta();
    let orientation = *rng.pick(&Direction::ALL).expect("nonempty");
    let pose = Machine {
        x: m.x + dx * step,
        y: m.y + dy * step,
        orientation,
        ..m
    };
    commit_pose(cand, pose)
}

fn cluster_destroy_repair(cand: &mut Candidate, rng: &mut Lcg32, cfg: &OptimizerConfig) -> bool {
    let cluster = select_cluster(cand, rng, cfg.cluster_move_min_size, cfg.cluster_move_max_size);
    if cluster.is_empty() {
        return false;
    }
    destroy_repair_beam(cand, &cluster, rng, cfg.repair_beam_width)
}

/// Pain of a connection: Manhattan length plus a corner proxy.
fn connection_pain(cand: &Candidate, conn: &fabrik_geom::Connection) -> i64 {
    let Some((src, tgt)) = cand.connection_ports(conn) else {
        return 0;
    };
    let a = src.external_tile();
    let b = tgt.external_tile();
    let turn = i64::from(a.0 != b.0 && a.1 != b.1) * 2;
    i64::from(fabrik_geom::manhattan(a, b)) + turn
}

fn critical_net_focus(cand: &mut Candidate, rng: &mut Lcg32, cfg: &OptimizerConfig) -> bool {
    if cand.connections.is_empty() {
        return false;
    }
    let mut ranked: Vec<(i64, fabrik_geom::ConnectionId)> = cand
        .connections
        .values()
        .map(|c| (connection_pain(cand, c), c.id))
        .collect();
    ranked.sort_by_key(|&(pain, id)| (std::cmp::Reverse(pain), id));
    let top = ((ranked.len() as f64 * 0.35).ceil() as usize).max(1);
    let (_, picked) = ranked[rng.index(top)];
    let conn = cand.connections[&picked];

    // Seed cluster: the net's movable endpoints plus the most painful
    // incident machines, capped at min(cluster_move_max_size, 4).
    let cap = cfg.cluster_move_max_size.min(4);
    let mut cluster: Vec<MachineId> = Vec::new();
    for id in [conn.source, conn.target] {
        if cand.machines.get(&id).map(|m| m.is_movable()).unwrap_or(false)
            && !cluster.contains(&id)
        {
            cluster.push(id);
        }
    }
    if cluster.is_empty() {
        return false;
    }
    let mut incident: Vec<(i64, MachineId)> = cand
        .connections
        .values()
        .filter(|c| {
            cluster.contains(&c.source) != cluster.contains(&c.target)
        })
        .filter_map(|c| {
            let other = if cluster.contains(&c.source) { c.target } else { c.source };
            let m = cand.machines.get(&other)?;
            m.is_movable().then_some((connection_pain(cand, c), other))
        })
        .collect();
    incident.sort_by_key(|&(pain, id)| (std::cmp::Reverse(pain), id));
    for (_, id) in incident {
        if cluster.len() >= cap {
            break;
        }
        if !cluster.contains(&id) {
            cluster.push(id);
        }
    }

    if destroy_repair_beam(cand, &cluster, rng, cfg.repair_beam_width) {
        return true;
    }
    // Fallback: repair the endpoints one at a time.
    let mut changed = false;
    for id in [conn.source, conn.target] {
        if cand.machines.get(&id).map(|m| m.is_movable()).unwrap_or(false) {
            let Some(original) = cand.machines.remove(&id) else { continue };
            match best_reinsertion_pose(cand, &original, rng) {
                Some(pose) => {
                    changed |= pose != original;
                    cand.machines.insert(id, pose);
                }
                None => {
                    cand.machines.insert(id, original);
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_geom::MachineKind;
    use fabrik_grid::GridState;

    fn sample() -> Candidate {
        let mut g = GridState::new(30, 30);
        let a = g.add_machine(MachineKind::Compact, 1, 1, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 20, 1, Direction::North).unwrap();
        let c = g.add_machine(MachineKind::Compact, 1, 20, Direction::North).unwrap();
        let d = g.add_machine(MachineKind::Anchor, 20, 20, Direction::North).unwrap();
        g.connect(a, 0, b, 0).unwrap();
        g.connect(a, 1, b, 1).unwrap();
        g.connect(b, 2, c, 0).unwrap();
        g.connect(d, 0, c, 2).unwrap();
        Candidate::from_grid(&g)
    }

    fn assert_valid(cand: &Candidate) {
        for m in cand.machines.values() {
            assert!(cand.can_place(m), "invalid pose after operator: {m:?}");
        }
    }

    #[test]
    fn every_operator_preserves_validity() {
        let cfg = OptimizerConfig::normal().normalized();
        for op in MoveOp::ALL {
            let mut cand = sample();
            let mut rng = Lcg32::new(1000 + op.index() as u32);
            for _ in 0..40 {
                apply_operator(op, &mut cand, &mut rng, &cfg);
                assert_valid(&cand);
            }
        }
    }

    #[test]
    fn operators_never_move_pinned_machines() {
        let cfg = OptimizerConfig::normal().normalized();
        let original = sample();
        let anchor_id = original
            .machines
            .values()
            .find(|m| !m.is_movable())
            .unwrap()
            .id;
        let anchor_pose = original.machines[&anchor_id];
        for op in MoveOp::ALL {
            let mut cand = original.clone();
            let mut rng = Lcg32::new(7 + op.index() as u32);
            for _ in 0..60 {
                apply_operator(op, &mut cand, &mut rng, &cfg);
            }
            assert_eq!(cand.machines[&anchor_id], anchor_pose, "{op:?} moved the anchor");
        }
    }

    #[test]
    fn move_toward_neighbor_reduces_distance() {
        let cfg = OptimizerConfig::normal().normalized();
        let mut cand = sample();
        let mut rng = Lcg32::new(3);
        let before: i64 = cand
            .connections
            .values()
            .filter_map(|c| cand.connection_manhattan(c))
            .map(i64::from)
            .sum();
        let mut changed = false;
        for _ in 0..200 {
            changed |= apply_operator(MoveOp::MoveTowardNeighbor, &mut cand, &mut rng, &cfg);
        }
        assert!(changed);
        let after: i64 = cand
            .connections
            .values()
            .filter_map(|c| cand.connection_manhattan(c))
            .map(i64::from)
            .sum();
        assert!(after <= before);
    }

    #[test]
    fn try_different_port_keeps_ports_unique() {
        let cfg = OptimizerConfig::normal().normalized();
        let mut cand = sample();
        let mut rng = Lcg32::new(21);
        for _ in 0..100 {
            apply_operator(MoveOp::TryDifferentPort, &mut cand, &mut rng, &cfg);
            let mut outs = std::collections::BTreeSet::new();
            let mut ins = std::collections::BTreeSet::new();
            for c in cand.connections.values() {
                assert!(outs.insert((c.source, c.source_port)), "output port reused");
                assert!(ins.insert((c.target, c.target_port)), "input port reused");
            }
        }
    }

    #[test]
    fn swap_positions_exchanges_coordinates() {
        let cfg = OptimizerConfig::normal().normalized();
        let original = sample();
        let mut cand = original.clone();
        let mut rng = Lcg32::new(5);
        let mut swapped = false;
        for _ in 0..100 {
            if apply_operator(MoveOp::SwapPositions, &mut cand, &mut rng, &cfg) {
                swapped = true;
                break;
            }
        }
        assert!(swapped);
        let positions_before: std::collections::BTreeSet<_> = original
            .machines
            .values()
            .filter(|m| m.is_movable())
            .map(|m| (m.x, m.y))
            .collect();
        let positions_after: std::collections::BTreeSet<_> = cand
            .machines
            .values()
            .filter(|m| m.is_movable())
            .map(|m| (m.x, m.y))
            .collect();
        assert_eq!(positions_before, positions_after);
    }

    #[test]
    fn rotate_best_picks_cheapest_fit() {
        let cfg = OptimizerConfig::normal().normalized();
        let mut cand = sample();
        let mut rng = Lcg32::new(9);
        for _ in 0..50 {
            apply_operator(MoveOp::RotateBest, &mut cand, &mut rng, &cfg);
            assert_valid(&cand);
        }
    }

    #[test]
    fn large_moves_keep_candidate_routable_shape() {
        let cfg = OptimizerConfig::normal().normalized();
        for op in [MoveOp::ClusterDestroyRepair, MoveOp::CriticalNetFocus] {
            let mut cand = sample();
            let mut rng = Lcg32::new(31 + op.index() as u32);
            for _ in 0..15 {
                apply_operator(op, &mut cand, &mut rng, &cfg);
                assert_valid(&cand);
                assert_eq!(cand.machines.len(), 4, "{op:?} lost a machine");
            }
        }
    }
}
