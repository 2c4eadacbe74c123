//! Adaptive operator dispatch.
//!
//! Each operator keeps a rolling window of the positive gains it produced;
//! a decayed mean of that window turns into a weight multiplier
//! `1 + ln(1 + reward)`. Probabilities are rebuilt every draw: every small
//! operator gets its floor, the remaining mass is split in proportion to
//! the capped weights, and the whole small-move distribution is scaled by
//! what the temperature-gated large-move budget leaves over. Long
//! stagnation flattens the distribution back toward the base weights.

use crate::config::OptimizerConfig;
use crate::operators::MoveOp;
use crate::rng::Lcg32;
use std::collections::VecDeque;

/// Decay factor for the rolling gain mean.
const REWARD_DECAY: f64 = 0.9;
/// Normalized temperature above which the early large-move rate applies.
const EARLY_TEMP_THRESHOLD: f64 = 0.45;
/// Fraction of the stagnation window after which the early rate returns.
const STAGNATION_EARLY_FRACTION: f64 = 0.6;

/// Context for one dispatch decision.
#[derive(Debug, Clone, Copy)]
pub struct DispatchCtx {
    /// `(T − minTemp) / (initialTemp − minTemp)`, clamped to `[0, 1]`.
    pub temp_norm: f64,
    /// Inner iterations completed in the current annealing run.
    pub iterations: u64,
    /// Inner iterations since the best score last improved.
    pub iterations_since_best: u64,
    /// Remaining large-move cooldown installed by a major improvement.
    pub cooldown: u32,
}

/// Per-operator gain statistics plus the probability builder.
#[derive(Debug, Clone)]
pub struct Dispatch {
    window: usize,
    gains: Vec<VecDeque<f64>>,
}

impl Dispatch {
    /// Creates a dispatcher sized from the config.
    pub fn new(cfg: &OptimizerConfig) -> Self {
        Self {
            window: cfg.adaptive_window,
            gains: vec![VecDeque::new(); MoveOp::ALL.len()],
        }
    }

    /// Records a positive gain produced by `op`.
    pub fn record_gain(&mut self, op: MoveOp, gain: f64) {
        if gain <= 0.0 {
            return;
        }
        let window = &mut self.gains[op.index()];
        window.push_back(gain);
        while window.len() > self.window {
            window.pop_front();
        }
    }

    /// Decayed mean of the gain window (newest entries weigh most).
    fn reward(&self, op: MoveOp) -> f64 {
        let window = &self.gains[op.index()];
        if window.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut norm = 0.0;
        // Newest entry at the back: age 0.
        for (age, gain) in window.iter().rev().enumerate() {
            let w = REWARD_DECAY.powi(age as i32);
            sum += gain * w;
            norm += w;
        }
        sum / norm
    }

    /// The active large-move budget.
    fn large_budget(&self, cfg: &OptimizerConfig, ctx: &DispatchCtx) -> f64 {
        if ctx.cooldown > 0 {
            return 0.0;
        }
        if !cfg.adaptive_ops {
            return cfg.large_move_rate;
        }
        let stagnating = ctx.iterations_since_best as f64
            > STAGNATION_EARLY_FRACTION * cfg.adaptive_stagnation_reset_window as f64;
        if ctx.temp_norm >= EARLY_TEMP_THRESHOLD || stagnating {
            cfg.large_move_rate_early
        } else {
            cfg.large_move_rate_late
        }
    }

    /// Builds the unit-mass distribution over the eight small operators:
    /// floors first, remainder in proportion to the capped weights.
    fn small_distribution(&self, cfg: &OptimizerConfig, adapted: bool) -> Vec<(MoveOp, f64)> {
        let small: Vec<MoveOp> = MoveOp::ALL.iter().copied().filter(|op| !op.is_large()).collect();
        let weights: Vec<f64> = small
            .iter()
            .map(|&op| {
                let base = op.base_weight();
                if adapted {
                    base * (1.0 + (1.0 + self.reward(op)).ln())
                } else {
                    base
                }
            })
            .collect();

        let floors: Vec<f64> = small.iter().map(|op| op.min_prob()).collect();
        let floor_mass: f64 = floors.iter().sum();
        let mut probs = floors.clone();
        let mut remainder = (1.0 - floor_mass).max(0.0);
        let cap = cfg.adaptive_max_operator_prob;

        // Water-fill: hand out the remainder proportionally, pinning any
        // operator that hits its cap and re-running on the rest.
        let mut open: Vec<usize> = (0..small.len()).collect();
        for _ in 0..small.len() {
            let open_weight: f64 = open.iter().map(|&i| weights[i]).sum();
            if remainder <= f64::EPSILON || open_weight <= f64::EPSILON {
                break;
            }
            let mut capped_now = Vec::new();
            for &i in &open {
                let share = remainder * weights[i] / open_weight;
                if probs[i] + share > cap {
                    capped_now.push(i);
                }
            }
            if capped_now.is_empty() {
                for &i in &open {
                    probs[i] += remainder * weights[i] / open_weight;
                }
                remainder = 0.0;
                break;
            }
            for &i in &capped_now {
                remainder -= cap - probs[i];
                probs[i] = cap;
            }
            open.retain(|i| !capped_now.contains(i));
        }
        if remainder > f64::EPSILON && !open.is_empty() {
            let even = remainder / open.len() as f64;
            for &i in &open {
                probs[i] += even;
            }
        }

        small.into_iter().zip(probs).collect()
    }

    /// Full dispatch probabilities for the current context, in
    /// [`MoveOp::ALL`] order, summing to 1.
    pub fn probabilities(&self, cfg: &OptimizerConfig, ctx: &DispatchCtx) -> Vec<f64> {
        let large = self.large_budget(cfg, ctx);
        let shared_scale = (1.0 - large).max(0.05);
        let adapted = cfg.adaptive_ops && ctx.iterations >= cfg.adaptive_warmup_iterations;

        let mut small = self.small_distribution(cfg, adapted);
        if adapted && ctx.iterations_since_best >= cfg.adaptive_stagnation_reset_window {
            let base = self.small_distribution(cfg, false);
            let f = cfg.adaptive_flatten_factor;
            for ((_, p), (_, b)) in small.iter_mut().zip(base) {
                *p = *p * (1.0 - f) + b * f;
            }
        }

        let critical = large * cfg.critical_net_rate;
        let cluster = large - critical;

        let mut probs = vec![0.0; MoveOp::ALL.len()];
        for (op, p) in small {
            probs[op.index()] = p * shared_scale;
        }
        probs[MoveOp::ClusterDestroyRepair.index()] = cluster;
        probs[MoveOp::CriticalNetFocus.index()] = critical;

        let total: f64 = probs.iter().sum();
        if total > f64::EPSILON {
            for p in &mut probs {
                *p /= total;
            }
        }
        probs
    }

    /// Samples an operator from the current distribution.
    pub fn select(&self, cfg: &OptimizerConfig, ctx: &DispatchCtx, rng: &mut Lcg32) -> MoveOp {
        let probs = self.probabilities(cfg, ctx);
        let mut roll = rng.next_f64();
        for (op, p) in MoveOp::ALL.iter().zip(&probs) {
            if roll < *p {
                return *op;
            }
            roll -= p;
        }
        // Floating-point slack lands on the last operator.
        *MoveOp::ALL.last().expect("nonempty")
    }
}
