//! Phase 4: compaction and orientation polish.
//!
//! Compaction translates the movable machines toward the origin and then
//! greedily slides each one left and up while placements stay valid,
//! committing only when the routed score does not regress. Orientation
//! polish tries the other three orientations per movable machine and
//! keeps strict improvements.

use crate::candidate::Candidate;
use fabrik_geom::{Direction, Machine};

/// Outer compaction passes before giving up.
const MAX_COMPACTION_PASSES: usize = 30;

/// Slides the movable machines into the top-left corner.
///
/// First the whole movable set translates so its bounding box sits at
/// `(1, 1)`; then machines are processed in ascending `x + y` order, each
/// decrementing x and then y while the placement stays valid. The outer
/// pass repeats until nothing moves, capped at 30 passes. The compacted
/// layout is committed iff its score does not exceed the input's.
pub fn compact(cand: &Candidate) -> Candidate {
    let movable = cand.movable_ids();
    if movable.is_empty() {
        return cand.clone();
    }
    let mut work = cand.clone();

    // Bounding-box translation toward (1, 1).
    let min_x = movable.iter().map(|id| work.machines[id].x).min().unwrap_or(1);
    let min_y = movable.iter().map(|id| work.machines[id].y).min().unwrap_or(1);
    let (dx, dy) = (1 - min_x, 1 - min_y);
    if dx != 0 || dy != 0 {
        let mut shifted = work.clone();
        for id in &movable {
            let m = shifted.machines.get_mut(id).expect("movable exists");
            m.x += dx;
            m.y += dy;
        }
        let valid = movable.iter().all(|id| {
            let pose = shifted.machines[id];
            shifted.can_place(&pose)
        });
        if valid {
            work = shifted;
        }
    }

    for _ in 0..MAX_COMPACTION_PASSES {
        let mut moved = false;
        let mut order: Vec<_> = movable
            .iter()
            .map(|&id| {
                let m = work.machines[&id];
                (m.x + m.y, id)
            })
            .collect();
        order.sort();
        for (_, id) in order {
            let mut pose = work.machines[&id];
            loop {
                let trial = Machine { x: pose.x - 1, ..pose };
                if trial.x >= 0 && work.can_place(&trial) {
                    pose = trial;
                    work.machines.insert(id, pose);
                    moved = true;
                } else {
                    break;
                }
            }
            loop {
                let trial = Machine { y: pose.y - 1, ..pose };
                if trial.y >= 0 && work.can_place(&trial) {
                    pose = trial;
                    work.machines.insert(id, pose);
                    moved = true;
                } else {
                    break;
                }
            }
        }
        if !moved {
            break;
        }
    }

    // Commit iff the compacted score does not regress: lexicographic over
    // (belts, area, corners) when both layouts route, penalized totals
    // otherwise.
    let keep = match (work.routed(), cand.routed()) {
        (Some((_, after)), Some((_, before))) => {
            after.lex_cmp(&before) != std::cmp::Ordering::Greater
        }
        _ => work.routed_cost() <= cand.routed_cost(),
    };
    if keep {
        work
    } else {
        cand.clone()
    }
}

/// Tries the other three orientations for every movable machine, keeping
/// each strict routed improvement (the cost falls back to the fast score
/// plus penalty when routing fails).
pub fn orientation_polish(cand: &Candidate) -> Candidate {
    let mut work = cand.clone();
    let mut current_cost = work.routed_cost();
    for id in work.movable_ids() {
        let pose = work.machines[&id];
        for orientation in Direction::ALL {
            if orientation == pose.orientation {
                continue;
            }
            let trial_pose = Machine { orientation, ..pose };
            if !work.can_place(&trial_pose) {
                continue;
            }
            let mut trial = work.clone();
            trial.machines.insert(id, trial_pose);
            let cost = trial.routed_cost();
            if cost < current_cost {
                work = trial;
                current_cost = cost;
            }
        }
    }
    work
}
