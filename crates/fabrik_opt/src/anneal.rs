//! The simulated-annealing core shared by Phase 1 (Manhattan proxy) and
//! Phase 2 (routed scoring).
//!
//! Classical geometric cooling with Metropolis acceptance. Each outer
//! batch runs `batch_size × iter_per_temp` proposals, then cools, reports
//! progress, and polls for cancellation. Five stagnant batches trigger a
//! reheat to `min(initialTemp/2, 3·T)` with the current state reset to the
//! best; a bounded reheat count keeps the schedule finite.

use crate::adaptive::{Dispatch, DispatchCtx};
use crate::candidate::{Candidate, UNROUTABLE_BASE};
use crate::config::OptimizerConfig;
use crate::control::ControlState;
use crate::elite::EliteArchive;
use crate::operators::apply_operator;
use crate::rng::Lcg32;
use fabrik_grid::SCORE_EPSILON;

/// Stagnant outer batches before a reheat.
const REHEAT_AFTER_BATCHES: u32 = 5;
/// Reheats allowed per annealing run, so the schedule terminates.
const MAX_REHEATS: u32 = 3;
/// Hard ceiling on outer batches per run.
const MAX_OUTER_BATCHES: u32 = 400;

/// Which scoring a phase uses.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SaPhase {
    /// Progress label.
    pub label: &'static str,
    /// Routed scoring (Phase 2) instead of the Manhattan proxy (Phase 1).
    pub routed: bool,
}

fn cost_of(cand: &Candidate, routed: bool) -> f64 {
    if routed {
        cand.routed_cost()
    } else {
        cand.fast_score().total
    }
}

/// Runs one annealing schedule from `start`, returning the best candidate
/// and its cost under the phase's scoring.
pub(crate) fn run_sa(
    start: Candidate,
    cfg: &OptimizerConfig,
    dispatch: &mut Dispatch,
    elite: &mut EliteArchive,
    rng: &mut Lcg32,
    ctl: &mut ControlState<'_>,
    phase: SaPhase,
) -> (Candidate, f64) {
    let mut current = start;
    let mut current_cost = cost_of(&current, phase.routed);
    let mut best = current.clone();
    let mut best_cost = current_cost;

    let mut temp = cfg.initial_temp;
    let mut local_iterations = 0u64;
    let mut iterations_since_best = 0u64;
    let mut cooldown = 0u32;
    let mut stagnant_batches = 0u32;
    let mut reheats = 0u32;
    let mut batches = 0u32;

    while temp > cfg.min_temp && batches < MAX_OUTER_BATCHES {
        batches += 1;
        let mut batch_improved = false;
        let batch_iters = u64::from(cfg.batch_size) * u64::from(cfg.iter_per_temp);

        for _ in 0..batch_iters {
            local_iterations += 1;
            ctl.iterations += 1;

            let ctx = DispatchCtx {
                temp_norm: ((temp - cfg.min_temp) / (cfg.initial_temp - cfg.min_temp))
                    .clamp(0.0, 1.0),
                iterations: local_iterations,
                iterations_since_best,
                cooldown,
            };
            let op = dispatch.select(cfg, &ctx, rng);
            cooldown = cooldown.saturating_sub(1);

            let mut proposal = current.clone();
            if !apply_operator(op, &mut proposal, rng, cfg) {
                iterations_since_best += 1;
                continue;
            }
            let proposal_cost = cost_of(&proposal, phase.routed);
            let delta = proposal_cost - current_cost;
            let accept = delta < 0.0 || rng.next_f64() < (-delta / temp).exp();
            if !accept {
                iterations_since_best += 1;
                continue;
            }

            if delta < 0.0 {
                dispatch.record_gain(op, -delta);
            }
            current = proposal;
            current_cost = proposal_cost;

            if current_cost < best_cost - SCORE_EPSILON {
                let gain = best_cost - current_cost;
                if cfg.large_move_cooldown_after_improve > 0
                    && gain > cfg.improve_cooldown_fraction * best_cost.abs()
                {
                    cooldown = cfg.large_move_cooldown_after_improve;
                }
                best = current.clone();
                best_cost = current_cost;
                iterations_since_best = 0;
                batch_improved = true;
                if phase.routed && best_cost < UNROUTABLE_BASE {
                    elite.offer(&best, best_cost);
                }
            } else {
                iterations_since_best += 1;
            }
        }

        temp *= cfg.cooling_rate;
        if batch_improved {
            stagnant_batches = 0;
        } else {
            stagnant_batches += 1;
            if stagnant_batches >= REHEAT_AFTER_BATCHES && reheats < MAX_REHEATS {
                temp = (cfg.initial_temp / 2.0).min(3.0 * temp);
                current = best.clone();
                current_cost = best_cost;
                stagnant_batches = 0;
                reheats += 1;
            }
        }

        ctl.emit(phase.label, best_cost);
        if !ctl.should_continue() {
            break;
        }
    }

    (best, best_cost)
}

/// A restart kick: 1–2 random small perturbations applied to an archive
/// sample before it seeds the next attempt.
pub(crate) fn kick(cand: &mut Candidate, cfg: &OptimizerConfig, rng: &mut Lcg32) {
    use crate::operators::MoveOp;
    const KICK_OPS: [MoveOp; 4] = [
        MoveOp::RandomShift,
        MoveOp::SwapPositions,
        MoveOp::JointMoveRotate,
        MoveOp::RotateBest,
    ];
    let kicks = 1 + rng.index(2);
    for _ in 0..kicks {
        let op = *rng.pick(&KICK_OPS).expect("nonempty");
        apply_operator(op, cand, rng, cfg);
    }
}
