//! Multi-phase layout optimizer for the Fabrik toolkit.
//!
//! [`run_optimizer`] drives the full pipeline over a grid state:
//!
//! 1. **Phase 0** — deterministic seed layouts (greedy, topology-layered,
//!    pattern-aware, two-layer exhaustive), each with one port-assignment
//!    refinement; the best seed starts the search.
//! 2. **Phase 1** — simulated annealing under the Manhattan-proxy score,
//!    with restarts.
//! 3. **Phase 2** — annealing under the routed score (unroutable
//!    candidates absorb a penalty), with elite-archive restart seeding.
//! 4. **Phase 3** — port assignment with a build-and-route commit rule.
//! 5. **Phase 4** — compaction and orientation polish, interleaved with a
//!    short cooler annealing run in deep mode.
//!
//! The best-ever routable layout is returned; when nothing beats the
//! input, the input is returned unchanged. The run is single-threaded,
//! cooperative, and fully deterministic for a fixed (config, seed, grid).

#![warn(missing_docs)]

pub mod adaptive;
pub mod anneal;
pub mod candidate;
pub mod config;
pub mod control;
pub mod deep;
pub mod elite;
pub mod operators;
pub mod polish;
pub mod ports;
pub mod repair;
pub mod rng;
pub mod seeds;

pub use candidate::Candidate;
pub use config::{EliteSnapshot, Mode, OptimizerConfig};
pub use control::{OptimizeControl, Progress};
pub use deep::{DeepSearch, DeepSearchState};

use adaptive::Dispatch;
use anneal::{kick, run_sa, SaPhase};
use candidate::UNROUTABLE_BASE;
use control::ControlState;
use elite::EliteArchive;
use fabrik_grid::{evaluate_grid, GridState, ScoreBreakdown};
use rng::Lcg32;
use std::time::{Duration, Instant};

/// The result of an optimizer run.
pub struct OptimizeOutcome {
    /// The best routed grid (the input grid when nothing improved).
    pub grid: GridState,
    /// Routed score of the returned grid.
    pub score: ScoreBreakdown,
    /// Total inner iterations executed.
    pub iterations: u64,
    /// The elite archive, when `persist_elite_archive` was set.
    pub elite_archive: Option<Vec<EliteSnapshot>>,
}

/// Runs the full optimization pipeline on `grid`.
///
/// The returned layout's routed total never exceeds the input's routed
/// total; an empty grid returns immediately with zero iterations and an
/// all-zero score.
pub fn run_optimizer(
    grid: &GridState,
    config: &OptimizerConfig,
    control: OptimizeControl<'_>,
) -> OptimizeOutcome {
    let cfg = config.normalized();
    let deadline = match (cfg.mode, cfg.time_budget_ms) {
        (Mode::Deep, Some(ms)) => Some(Instant::now() + Duration::from_millis(ms)),
        _ => None,
    };
    let mut ctl = ControlState::new(control, deadline);

    let base = Candidate::from_grid(grid);
    if base.machines.is_empty() {
        return OptimizeOutcome {
            grid: grid.clone(),
            score: ScoreBreakdown::zero(),
            iterations: 0,
            elite_archive: cfg.persist_elite_archive.then(Vec::new),
        };
    }

    let baseline = base.routed();
    let baseline_cost = match &baseline {
        Some((_, score)) => score.total,
        None => base.fast_score().total + base.unroutable_penalty(),
    };

    let mut elite = EliteArchive::new(&cfg);
    if let Some(snapshots) = &cfg.incoming_elite_archive {
        elite.absorb_snapshots(snapshots);
    }
    if let Some((_, score)) = &baseline {
        elite.offer(&base, score.total);
    }

    // Nothing to search over: no connections to shorten, or no machine
    // the optimizer may touch.
    if base.connections.is_empty() || base.movable_ids().is_empty() {
        return finish(grid, baseline, &ctl, &cfg, &elite);
    }

    let mut rng = match cfg.seed {
        Some(seed) => Lcg32::new(seed),
        None => Lcg32::from_entropy(),
    };
    let mut dispatch = Dispatch::new(&cfg);

    // Phase 0: seeds.
    let seeds = seeds::generate_seeds(&base, &cfg);
    let mut best = base.clone();
    let mut best_cost = base.routed_cost();
    for (_, seed) in &seeds {
        let cost = seed.routed_cost();
        if cost < best_cost {
            best = seed.clone();
            best_cost = cost;
        }
        if cost < UNROUTABLE_BASE {
            elite.offer(seed, cost);
        }
    }
    // Archive continuity: a carried-in elite entry may already beat every
    // seed.
    if let Some(entry) = elite.entries().first() {
        if entry.score < best_cost {
            best = entry.candidate.clone();
            best_cost = entry.score;
        }
    }
    ctl.emit("seeds", best_cost);

    // Phase 1: fast annealing with restarts.
    if ctl.should_continue() {
        for restart in 0..cfg.phase1_restarts {
            let start = restart_start(&best, restart, &elite, &cfg, &mut rng);
            let (cand, _) = run_sa(
                start,
                &cfg,
                &mut dispatch,
                &mut elite,
                &mut rng,
                &mut ctl,
                SaPhase { label: "phase1", routed: false },
            );
            let cost = cand.routed_cost();
            if cost < best_cost {
                best = cand;
                best_cost = cost;
                if cost < UNROUTABLE_BASE {
                    elite.offer(&best, cost);
                }
            }
            if !ctl.should_continue() {
                break;
            }
        }
    }

    // Phase 2: routed annealing with elite seeding.
    if ctl.should_continue() {
        for attempt in 0..cfg.phase2_attempts {
            let start = restart_start(&best, attempt, &elite, &cfg, &mut rng);
            let (cand, cost) = run_sa(
                start,
                &cfg,
                &mut dispatch,
                &mut elite,
                &mut rng,
                &mut ctl,
                SaPhase { label: "phase2", routed: true },
            );
            if cost < best_cost {
                best = cand;
                best_cost = cost;
            }
            if !ctl.should_continue() {
                break;
            }
        }
    }

    // Phase 3: port assignment.
    if ctl.should_continue() {
        let refined = ports::refine_ports(&best);
        let cost = refined.routed_cost();
        if cost <= best_cost {
            best = refined;
            best_cost = cost;
        }
        ctl.emit("ports", best_cost);
    }

    // Phase 4: compaction and orientation polish.
    if ctl.should_continue() {
        for _ in 0..cfg.local_polish_passes {
            let compacted = polish::compact(&best);
            let cost = compacted.routed_cost();
            if cost <= best_cost {
                best = compacted;
                best_cost = cost;
            }
            let polished = polish::orientation_polish(&best);
            let cost = polished.routed_cost();
            if cost <= best_cost {
                best = polished;
                best_cost = cost;
            }
            // Deep mode interleaves a short, cooler annealing run.
            if cfg.mode == Mode::Deep && ctl.should_continue() {
                let mut cool = cfg.clone();
                cool.initial_temp = (cfg.min_temp * 4.0).min(cfg.initial_temp);
                let (cand, cost) = run_sa(
                    best.clone(),
                    &cool,
                    &mut dispatch,
                    &mut elite,
                    &mut rng,
                    &mut ctl,
                    SaPhase { label: "polish", routed: true },
                );
                if cost < best_cost {
                    best = cand;
                    best_cost = cost;
                }
            }
            ctl.emit("polish", best_cost);
            if !ctl.should_continue() {
                break;
            }
        }
    }

    if best_cost < UNROUTABLE_BASE {
        elite.offer(&best, best_cost);
    }

    // Baseline guarantee: never return something worse than the input.
    if best_cost <= baseline_cost {
        if let Some((routed_grid, score)) = best.routed() {
            return OptimizeOutcome {
                grid: routed_grid,
                score,
                iterations: ctl.iterations,
                elite_archive: cfg.persist_elite_archive.then(|| elite.to_snapshots()),
            };
        }
    }
    finish(grid, baseline, &ctl, &cfg, &elite)
}

/// Falls back to the input layout (routed when possible, otherwise the
/// original grid unchanged).
fn finish(
    grid: &GridState,
    baseline: Option<(GridState, ScoreBreakdown)>,
    ctl: &ControlState<'_>,
    cfg: &OptimizerConfig,
    elite: &EliteArchive,
) -> OptimizeOutcome {
    let archive = cfg.persist_elite_archive.then(|| elite.to_snapshots());
    match baseline {
        Some((routed_grid, score)) => OptimizeOutcome {
            grid: routed_grid,
            score,
            iterations: ctl.iterations,
            elite_archive: archive,
        },
        None => OptimizeOutcome {
            grid: grid.clone(),
            score: evaluate_grid(grid),
            iterations: ctl.iterations,
            elite_archive: archive,
        },
    }
}

/// The starting candidate for a restart: the incumbent on the first
/// round, otherwise a biased elite sample with one or two random kicks
/// (when the kicked layout stays routable).
fn restart_start(
    incumbent: &Candidate,
    round: u32,
    elite: &EliteArchive,
    cfg: &OptimizerConfig,
    rng: &mut Lcg32,
) -> Candidate {
    if round == 0 {
        return incumbent.clone();
    }
    if let Some(entry) = elite.sample(rng) {
        let mut kicked = entry.candidate.clone();
        kick(&mut kicked, cfg, rng);
        if kicked.routed().is_some() {
            return kicked;
        }
    }
    incumbent.clone()
}
