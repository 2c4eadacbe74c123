//! Two-layer exhaustive seed.
//!
//! When the topology is exactly two layers deep and the permutation
//! budget `|top|! · |bottom|! ≤ 4000` allows it, every row ordering is
//! placed and routed; the best routed layout wins (best fast layout when
//! nothing routes).

use crate::candidate::Candidate;
use crate::seeds::layer_groups;
use fabrik_geom::{Machine, MachineId};
use std::collections::BTreeMap;

/// Permutation budget: `|top|! · |bottom|!` must not exceed this.
const PERMUTATION_BUDGET: u64 = 4000;
/// Horizontal gap between row members.
const ROW_GAP: i32 = 2;

fn factorial(n: usize) -> u64 {
    (1..=n as u64).product::<u64>().max(1)
}

/// Builds the exhaustive seed, or abstains when the topology is not
/// two-layer, the budget is exceeded, or pinned machines are present.
pub fn two_layer_exhaustive_seed(base: &Candidate) -> Option<Candidate> {
    if base.machines.values().any(|m| !m.is_movable()) {
        return None;
    }
    let groups = layer_groups(base);
    if groups.len() != 2 {
        return None;
    }
    let (top, bottom) = (&groups[0], &groups[1]);
    if factorial(top.len()).saturating_mul(factorial(bottom.len())) > PERMUTATION_BUDGET {
        return None;
    }

    let mut best_routed: Option<(f64, Candidate)> = None;
    let mut best_fast: Option<(f64, Candidate)> = None;
    for top_perm in permutations(top) {
        for bottom_perm in permutations(bottom) {
            let Some(cand) = place_two_rows(base, &top_perm, &bottom_perm) else {
                continue;
            };
            match cand.routed() {
                Some((_, score)) => {
                    if best_routed.as_ref().map(|(b, _)| score.total < *b).unwrap_or(true) {
                        best_routed = Some((score.total, cand));
                    }
                }
                None => {
                    let fast = cand.fast_score().total;
                    if best_fast.as_ref().map(|(b, _)| fast < *b).unwrap_or(true) {
                        best_fast = Some((fast, cand));
                    }
                }
            }
        }
    }
    best_routed.or(best_fast).map(|(_, cand)| cand)
}

/// All permutations in a stable, deterministic order.
fn permutations(items: &[MachineId]) -> Vec<Vec<MachineId>> {
    let mut out = Vec::new();
    let mut work = items.to_vec();
    permute(&mut work, 0, &mut out);
    out
}

fn permute(work: &mut Vec<MachineId>, k: usize, out: &mut Vec<Vec<MachineId>>) {
    if k == work.len() {
        out.push(work.clone());
        return;
    }
    for i in k..work.len() {
        work.swap(k, i);
        permute(work, k + 1, out);
        work.swap(k, i);
    }
}

/// Places the two rows; `None` when a machine cannot fit its slot.
fn place_two_rows(base: &Candidate, top: &[MachineId], bottom: &[MachineId]) -> Option<Candidate> {
    let mut cand = base.clone();
    let mut originals: BTreeMap<MachineId, Machine> = BTreeMap::new();
    for &id in top.iter().chain(bottom) {
        let m = cand.machines.remove(&id)?;
        originals.insert(id, m);
    }

    let mut y = 1;
    for row in [top, bottom] {
        let mut x = 1;
        let mut row_height = 0;
        for &id in row {
            let original = originals.get(&id).copied()?;
            let pose = Machine { x, y, ..original };
            if !cand.can_place(&pose) {
                return None;
            }
            let (w, h) = pose.oriented_dims();
            row_height = row_height.max(h);
            x += w + ROW_GAP;
            cand.machines.insert(id, pose);
        }
        y += row_height + ROW_GAP + 1;
    }
    Some(cand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_geom::{Direction, MachineKind};
    use fabrik_grid::GridState;

    #[test]
    fn factorial_budget() {
        assert_eq!(factorial(0), 1);
        assert_eq!(factorial(4), 24);
        assert!(factorial(4) * factorial(4) <= PERMUTATION_BUDGET);
        assert!(factorial(5) * factorial(5) > PERMUTATION_BUDGET);
    }

    #[test]
    fn permutations_are_exhaustive_and_deterministic() {
        let ids: Vec<MachineId> = (0..3).map(MachineId::from_raw).collect();
        let perms = permutations(&ids);
        assert_eq!(perms.len(), 6);
        let unique: std::collections::BTreeSet<_> = perms.iter().collect();
        assert_eq!(unique.len(), 6);
        assert_eq!(permutations(&ids), perms);
    }

    #[test]
    fn finds_the_uncrossed_ordering() {
        // Two sources over two sinks wired straight down; the exhaustive
        // sweep must order the bottom row to match the top.
        let mut g = GridState::new(40, 40);
        let s0 = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let s1 = g.add_machine(MachineKind::Compact, 10, 0, Direction::North).unwrap();
        let t0 = g.add_machine(MachineKind::Compact, 0, 20, Direction::North).unwrap();
        let t1 = g.add_machine(MachineKind::Compact, 10, 20, Direction::North).unwrap();
        g.connect(s0, 0, t0, 0).unwrap();
        g.connect(s1, 0, t1, 0).unwrap();
        let base = Candidate::from_grid(&g);

        let seed = two_layer_exhaustive_seed(&base).expect("two-layer budget fits");
        assert!(seed.routed().is_some(), "winner routes");
        let left_top = seed.machines[&s0].x < seed.machines[&s1].x;
        let left_bottom = seed.machines[&t0].x < seed.machines[&t1].x;
        assert_eq!(left_top, left_bottom, "rows ordered without crossing");
    }

    #[test]
    fn abstains_on_three_layers() {
        let mut g = GridState::new(40, 40);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 10, 0, Direction::North).unwrap();
        let c = g.add_machine(MachineKind::Compact, 20, 0, Direction::North).unwrap();
        g.connect(a, 0, b, 0).unwrap();
        g.connect(b, 0, c, 0).unwrap();
        let base = Candidate::from_grid(&g);
        assert!(two_layer_exhaustive_seed(&base).is_none());
    }

    #[test]
    fn abstains_over_budget() {
        let mut g = GridState::new(200, 40);
        let mut tops = Vec::new();
        for i in 0..5 {
            tops.push(g.add_machine(MachineKind::Compact, i * 12, 0, Direction::North).unwrap());
        }
        let mut bottoms = Vec::new();
        for i in 0..5 {
            bottoms.push(g.add_machine(MachineKind::Compact, i * 12, 20, Direction::North).unwrap());
        }
        for i in 0..5 {
            g.connect(tops[i], 0, bottoms[i], 0).unwrap();
        }
        let base = Candidate::from_grid(&g);
        // 5! · 5! = 14400 > 4000.
        assert!(two_layer_exhaustive_seed(&base).is_none());
    }
}
