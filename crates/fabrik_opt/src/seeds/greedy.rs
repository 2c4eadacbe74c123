//! Greedy placement seed.
//!
//! The most-connected movable machine lands at a fixed top-left slot;
//! the rest follow in decreasing connectivity to the already-placed set,
//! each taking the cheapest valid pose one tile off a face of its
//! most-connected placed neighbor, with a spiral-search fallback.

use crate::candidate::Candidate;
use crate::repair::{pose_cost, side_poses, spiral_pose};
use fabrik_geom::{Machine, MachineId};

/// The fixed slot the first machine is anchored to.
const FIRST_SLOT: (i32, i32) = (1, 1);

/// Builds the greedy seed. `None` only when there is nothing to place.
pub fn greedy_seed(base: &Candidate) -> Option<Candidate> {
    let movable = base.movable_ids();
    if movable.is_empty() {
        return None;
    }

    // Start from the fixed machines only.
    let mut cand = base.clone();
    let mut pending: Vec<Machine> = Vec::new();
    for id in &movable {
        if let Some(m) = cand.machines.remove(id) {
            pending.push(m);
        }
    }

    while !pending.is_empty() {
        // Decreasing connectivity to the placed set; total degree then id
        // break ties.
        let connectivity = |id: MachineId| -> usize {
            base.connections
                .values()
                .filter(|c| {
                    (c.source == id && cand.machines.contains_key(&c.target))
                        || (c.target == id && cand.machines.contains_key(&c.source))
                })
                .count()
        };
        let next_idx = (0..pending.len())
            .max_by_key(|&i| {
                let id = pending[i].id;
                (connectivity(id), base.degree(id), std::cmp::Reverse(id))
            })
            .expect("nonempty");
        let original = pending.swap_remove(next_idx);

        // The most-connected neighbor among machines already placed.
        let anchor = cand
            .neighbor_weights(original.id)
            .into_iter()
            .filter(|(id, _)| cand.machines.contains_key(id))
            .max_by_key(|&(id, weight)| (weight, std::cmp::Reverse(id)))
            .and_then(|(id, _)| cand.machines.get(&id).copied());
        let pose = match anchor {
            Some(anchor) => side_poses(original.id, original.kind, &anchor)
                .into_iter()
                .filter(|pose| cand.can_place(pose))
                .map(|pose| (pose_cost(&cand, &pose), pose))
                .min_by_key(|(cost, _)| *cost)
                .map(|(_, pose)| pose)
                .or_else(|| {
                    spiral_pose(&cand, original.id, original.kind, anchor.x, anchor.y)
                }),
            None => {
                let slot = Machine {
                    x: FIRST_SLOT.0,
                    y: FIRST_SLOT.1,
                    ..original
                };
                if cand.can_place(&slot) {
                    Some(slot)
                } else {
                    spiral_pose(&cand, original.id, original.kind, FIRST_SLOT.0, FIRST_SLOT.1)
                }
            }
        };

        match pose {
            Some(pose) => {
                cand.machines.insert(pose.id, pose);
            }
            None => {
                // Grid too full to seed; keep the original pose.
                cand.machines.insert(original.id, original);
            }
        }
    }
    Some(cand)
}
