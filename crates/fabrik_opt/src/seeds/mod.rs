//! Phase 0: deterministic seed layouts.
//!
//! Four generators produce starting points for annealing; each seed gets
//! one port-assignment refinement before scoring, and the best-scoring
//! seed (routed when possible, fast otherwise) becomes the SA start.
//! Pinned machines keep their poses in every generator.

mod exhaustive;
mod greedy;
mod layered;
mod pattern;

use crate::candidate::Candidate;
use crate::config::OptimizerConfig;
use crate::ports::refine_ports;

pub use exhaustive::two_layer_exhaustive_seed;
pub use greedy::greedy_seed;
pub use layered::layered_seed;
pub use pattern::pattern_seed;

use fabrik_geom::MachineId;
use std::collections::BTreeMap;

/// Longest-path layer index per machine, relaxed over the connection DAG.
/// Cycles stop relaxing at the machine count, so the result is total.
pub(crate) fn layer_indices(cand: &Candidate) -> BTreeMap<MachineId, usize> {
    let mut layer: BTreeMap<MachineId, usize> = cand.machines.keys().map(|&id| (id, 0)).collect();
    let cap = cand.machines.len();
    for _ in 0..cap {
        let mut changed = false;
        for conn in cand.connections.values() {
            let (Some(&src), Some(&tgt)) = (layer.get(&conn.source), layer.get(&conn.target))
            else {
                continue;
            };
            if tgt < src + 1 && src + 1 <= cap {
                layer.insert(conn.target, src + 1);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    layer
}

/// Machines grouped by layer index, each group in id order.
pub(crate) fn layer_groups(cand: &Candidate) -> Vec<Vec<MachineId>> {
    let indices = layer_indices(cand);
    let depth = indices.values().copied().max().map(|d| d + 1).unwrap_or(0);
    let mut groups = vec![Vec::new(); depth];
    for (&id, &layer) in &indices {
        groups[layer].push(id);
    }
    groups.retain(|g| !g.is_empty());
    groups
}

/// Runs every generator, refines ports on each result, and returns the
/// labeled seeds (the unmodified current layout is always first).
pub fn generate_seeds(base: &Candidate, cfg: &OptimizerConfig) -> Vec<(&'static str, Candidate)> {
    let mut seeds: Vec<(&'static str, Candidate)> = vec![("current", base.clone())];
    if cfg.use_exploration_seeds {
        if let Some(seed) = greedy_seed(base) {
            seeds.push(("greedy", refine_ports(&seed)));
        }
        if let Some(seed) = layered_seed(base) {
            seeds.push(("layered", refine_ports(&seed)));
        }
        if let Some(seed) = pattern_seed(base) {
            seeds.push(("pattern", refine_ports(&seed)));
        }
        if let Some(seed) = two_layer_exhaustive_seed(base) {
            seeds.push(("two-layer", refine_ports(&seed)));
        }
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_geom::{Direction, MachineKind};
    use fabrik_grid::GridState;

    fn chain() -> Candidate {
        let mut g = GridState::new(40, 40);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 30, 0, Direction::North).unwrap();
        let c = g.add_machine(MachineKind::Compact, 30, 30, Direction::North).unwrap();
        g.connect(a, 0, b, 0).unwrap();
        g.connect(b, 0, c, 0).unwrap();
        Candidate::from_grid(&g)
    }

    #[test]
    fn layering_follows_longest_paths() {
        let cand = chain();
        let groups = layer_groups(&cand);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[2].len(), 1);
    }

    #[test]
    fn layering_survives_cycles() {
        let mut g = GridState::new(40, 40);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 10, 0, Direction::North).unwrap();
        g.connect(a, 0, b, 0).unwrap();
        g.connect(b, 0, a, 0).unwrap();
        let cand = Candidate::from_grid(&g);
        // Terminates and assigns every machine a layer.
        let indices = layer_indices(&cand);
        assert_eq!(indices.len(), 2);
    }

    #[test]
    fn seeds_always_include_current_layout() {
        let cand = chain();
        let mut cfg = OptimizerConfig::normal().normalized();
        cfg.use_exploration_seeds = false;
        let seeds = generate_seeds(&cand, &cfg);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].0, "current");

        cfg.use_exploration_seeds = true;
        let seeds = generate_seeds(&cand, &cfg);
        assert!(seeds.len() >= 3, "greedy and layered always produce seeds");
    }

    #[test]
    fn all_seeds_are_valid_layouts() {
        let cand = chain();
        let cfg = OptimizerConfig::normal().normalized();
        for (name, seed) in generate_seeds(&cand, &cfg) {
            assert_eq!(seed.machines.len(), cand.machines.len(), "{name} lost machines");
            for m in seed.machines.values() {
                assert!(seed.can_place(m), "{name} produced an invalid pose");
            }
        }
    }
}
