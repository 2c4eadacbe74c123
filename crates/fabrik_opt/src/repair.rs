//! Repair placement: reinserting removed machines at low-cost poses.
//!
//! Used by the greedy seed, the jump operator, and the destroy-repair
//! large moves. Candidate poses for a machine are enumerated one tile off
//! each face of its placed neighbors (centered and edge-flush variants)
//! across all four orientations, plus random jitters around the neighbor
//! centroid and the original pose; the valid pose with the lowest
//! Manhattan belt cost wins.

use crate::candidate::Candidate;
use crate::rng::Lcg32;
use fabrik_geom::{machine_ports, manhattan, Direction, Machine, MachineId};
use std::collections::BTreeSet;

/// Random jitter poses tried around the neighbor centroid.
const JITTER_ATTEMPTS: usize = 24;
/// Jitter radius in tiles.
const JITTER_RADIUS: i32 = 5;

/// Manhattan belt cost of `pose` for every connection touching it whose
/// other endpoint is present, with `pose` overriding the machine's stored
/// position.
pub fn pose_cost(cand: &Candidate, pose: &Machine) -> i64 {
    let mut cost = 0i64;
    for conn in cand.connections.values() {
        let (src_machine, tgt_machine) = if conn.source == pose.id {
            let Some(t) = cand.machines.get(&conn.target) else { continue };
            (*pose, *t)
        } else if conn.target == pose.id {
            let Some(s) = cand.machines.get(&conn.source) else { continue };
            (*s, *pose)
        } else {
            continue;
        };
        let Some(out) = machine_ports(&src_machine).outputs.get(conn.source_port).copied() else {
            continue;
        };
        let Some(inp) = machine_ports(&tgt_machine).inputs.get(conn.target_port).copied() else {
            continue;
        };
        cost += i64::from(manhattan(out.external_tile(), inp.external_tile()));
    }
    cost
}

/// Poses one tile off each face of `anchor`, across all four orientations,
/// in centered and both edge-flush alignments.
pub fn side_poses(id: MachineId, kind: fabrik_geom::MachineKind, anchor: &Machine) -> Vec<Machine> {
    let (aw, ah) = anchor.oriented_dims();
    let mut poses = Vec::new();
    for orientation in Direction::ALL {
        let probe = Machine {
            id,
            kind,
            x: 0,
            y: 0,
            orientation,
        };
        let (mw, mh) = probe.oriented_dims();
        let xs = [anchor.x + (aw - mw) / 2, anchor.x, anchor.x + aw - mw];
        let ys = [anchor.y + (ah - mh) / 2, anchor.y, anchor.y + ah - mh];
        // North and south sides.
        for x in xs {
            poses.push(Machine { x, y: anchor.y - mh - 1, ..probe });
            poses.push(Machine { x, y: anchor.y + ah + 1, ..probe });
        }
        // West and east sides.
        for y in ys {
            poses.push(Machine { x: anchor.x - mw - 1, y, ..probe });
            poses.push(Machine { x: anchor.x + aw + 1, y, ..probe });
        }
    }
    poses
}

/// Expanding-ring spiral of positions around `(cx, cy)`; at each position
/// every orientation is tried. The first valid pose wins.
pub fn spiral_pose(cand: &Candidate, id: MachineId, kind: fabrik_geom::MachineKind, cx: i32, cy: i32) -> Option<Machine> {
    let max_radius = cand.width.max(cand.height);
    for radius in 0..=max_radius {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs().max(dy.abs()) != radius {
                    continue; // ring perimeter only
                }
                for orientation in Direction::ALL {
                    let pose = Machine {
                        id,
                        kind,
                        x: cx + dx,
                        y: cy + dy,
                        orientation,
                    };
                    if cand.can_place(&pose) {
                        return Some(pose);
                    }
                }
            }
        }
    }
    None
}

/// The placed machines connected to `id`.
fn placed_neighbors(cand: &Candidate, id: MachineId) -> Vec<Machine> {
    let mut seen = BTreeSet::new();
    let mut neighbors = Vec::new();
    for conn in cand.connections.values() {
        let other = if conn.source == id {
            conn.target
        } else if conn.target == id {
            conn.source
        } else {
            continue;
        };
        if let Some(m) = cand.machines.get(&other) {
            if seen.insert(other) {
                neighbors.push(*m);
            }
        }
    }
    neighbors
}

/// Finds the cheapest valid pose for a machine that is currently absent
/// from the candidate: side poses around every placed neighbor, random
/// jitters near the neighbor centroid, and the original pose.
pub fn best_reinsertion_pose(
    cand: &Candidate,
    original: &Machine,
    rng: &mut Lcg32,
) -> Option<Machine> {
    let neighbors = placed_neighbors(cand, original.id);
    let mut poses: Vec<Machine> = Vec::new();
    for anchor in &neighbors {
        poses.extend(side_poses(original.id, original.kind, anchor));
    }
    if !neighbors.is_empty() {
        let cx = neighbors.iter().map(|m| m.x).sum::<i32>() / neighbors.len() as i32;
        let cy = neighbors.iter().map(|m| m.y).sum::<i32>() / neighbors.len() as i32;
        for _ in 0..JITTER_ATTEMPTS {
            let x = cx + rng.range_i32(-JITTER_RADIUS, JITTER_RADIUS);
            let y = cy + rng.range_i32(-JITTER_RADIUS, JITTER_RADIUS);
            let orientation = *rng.pick(&Direction::ALL).expect("nonempty");
            poses.push(Machine {
                id: original.id,
                kind: original.kind,
                x,
                y,
                orientation,
            });
        }
    }
    poses.push(*original);

    poses
        .into_iter()
        .filter(|pose| cand.can_place(pose))
        .map(|pose| (pose_cost(cand, &pose), pose))
        .min_by_key(|(cost, _)| *cost)
        .map(|(_, pose)| pose)
}

/// Picks a connected cluster of movable machines by a weighted random walk
/// over the connection multigraph. Size lands in `[min_size, max_size]`
/// when enough connected movables exist.
pub fn select_cluster(
    cand: &Candidate,
    rng: &mut Lcg32,
    min_size: usize,
    max_size: usize,
) -> Vec<MachineId> {
    let movable = cand.movable_ids();
    if movable.is_empty() {
        return Vec::new();
    }
    let target = min_size + rng.index(max_size - min_size + 1);
    let start = *rng.pick(&movable).expect("nonempty");
    let mut cluster = vec![start];
    let mut member: BTreeSet<MachineId> = cluster.iter().copied().collect();

    let mut frontier = start;
    for _ in 0..target * 4 {
        if cluster.len() >= target {
            break;
        }
        let weights: Vec<(MachineId, usize)> = cand
            .neighbor_weights(frontier)
            .into_iter()
            .filter(|(id, _)| {
                cand.machines
                    .get(id)
                    .map(|m| m.is_movable())
                    .unwrap_or(false)
            })
            .collect();
        if weights.is_empty() {
            break;
        }
        let total: usize = weights.iter().map(|(_, w)| w).sum();
        let mut roll = rng.index(total);
        let mut next = weights[0].0;
        for (id, w) in &weights {
            if roll < *w {
                next = *id;
                break;
            }
            roll -= w;
        }
        if member.insert(next) {
            cluster.push(next);
        }
        frontier = next;
    }
    cluster
}

/// Destroys the cluster and reinserts each machine at its cheapest valid
/// pose, in decreasing external-connection order. On any failed
/// reinsertion the whole candidate is restored and `false` returned.
pub fn destroy_repair(cand: &mut Candidate, cluster: &[MachineId], rng: &mut Lcg32) -> bool {
    if cluster.is_empty() {
        return false;
    }
    let cluster_set: BTreeSet<MachineId> = cluster.iter().copied().collect();
    let mut removed: Vec<Machine> = Vec::new();
    for id in cluster {
        if let Some(m) = cand.machines.remove(id) {
            removed.push(m);
        }
    }
    if removed.is_empty() {
        return false;
    }

    // Decreasing external-connection order: most-anchored machines first.
    let external_degree = |id: MachineId| -> usize {
        cand.connections
            .values()
            .filter(|c| {
                (c.source == id && !cluster_set.contains(&c.target))
                    || (c.target == id && !cluster_set.contains(&c.source))
            })
            .count()
    };
    removed.sort_by_key(|m| (std::cmp::Reverse(external_degree(m.id)), m.id));

    let snapshot = removed.clone();
    for original in &removed {
        match best_reinsertion_pose(cand, original, rng) {
            Some(pose) => {
                cand.machines.insert(pose.id, pose);
            }
            None => {
                for m in &snapshot {
                    cand.machines.insert(m.id, *m);
                }
                return false;
            }
        }
    }
    true
}

/// Runs `beam_width` independently seeded destroy-repair attempts and
/// commits the one with the best routed score (fast score plus penalty
/// when unroutable).
pub fn destroy_repair_beam(
    cand: &mut Candidate,
    cluster: &[MachineId],
    rng: &mut Lcg32,
    beam_width: u32,
) -> bool {
    if beam_width <= 1 {
        return destroy_repair(cand, cluster, rng);
    }
    let mut best: Option<(f64, Candidate)> = None;
    for _ in 0..beam_width {
        let mut attempt_rng = rng.spawn();
        let mut attempt = cand.clone();
        if destroy_repair(&mut attempt, cluster, &mut attempt_rng) {
            let cost = attempt.routed_cost();
            if best.as_ref().map(|(b, _)| cost < *b).unwrap_or(true) {
                best = Some((cost, attempt));
            }
        }
    }
    match best {
        Some((_, winner)) => {
            *cand = winner;
            true
        }
        None => false,
    }
}
