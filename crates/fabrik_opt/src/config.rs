//! Optimizer configuration.
//!
//! All options are serde-deserializable so hosts can pass configuration
//! straight from JSON. Defaults differ between [`OptimizerConfig::normal`]
//! and [`OptimizerConfig::deep`]; invalid values are silently coerced to
//! sane ranges by [`OptimizerConfig::normalized`] rather than rejected.

use fabrik_layout::LayoutFile;
use serde::{Deserialize, Serialize};

/// How hard the optimizer works.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single bounded run; ignores the time budget.
    #[default]
    Normal,
    /// Longer run honoring `time_budget_ms` and extra restarts.
    Deep,
}

/// A persisted elite-archive entry: a layout snapshot plus its routed
/// total score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EliteSnapshot {
    /// The layout (machines + connections).
    pub layout: LayoutFile,
    /// Routed total score of the snapshot.
    pub score: f64,
}

/// Full optimizer configuration.
///
/// Repetition counts, the elite-archive shape, the large-move schedule,
/// the adaptive-dispatch knobs, and the annealing schedule. Construct via
/// [`OptimizerConfig::normal`] or [`OptimizerConfig::deep`] and override
/// fields as needed; every run passes through [`normalized`]
/// (`OptimizerConfig::normalized`) first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Run mode.
    pub mode: Mode,
    /// Wall-clock budget in milliseconds; honored by deep mode only.
    pub time_budget_ms: Option<u64>,
    /// Phase 1 (fast proxy) restart count.
    pub phase1_restarts: u32,
    /// Phase 2 (routed) attempt count.
    pub phase2_attempts: u32,
    /// Phase 4 polish pass count.
    pub local_polish_passes: u32,
    /// Whether Phase 0 generates exploration seeds beyond the current
    /// layout.
    pub use_exploration_seeds: bool,

    /// Elite archive capacity.
    pub elite_pool_size: usize,
    /// Deduplicate archive entries by pose fingerprint.
    pub elite_diversity_hash: bool,
    /// Minimum diversity distance between archive entries (0 disables).
    pub elite_min_distance: f64,
    /// Carry the elite archive out of the run.
    pub persist_elite_archive: bool,
    /// Archive carried in from a previous run.
    pub incoming_elite_archive: Option<Vec<EliteSnapshot>>,

    /// Baseline probability budget for large moves.
    pub large_move_rate: f64,
    /// Large-move budget while the schedule is hot.
    pub large_move_rate_early: f64,
    /// Large-move budget once the schedule has cooled.
    pub large_move_rate_late: f64,
    /// Iterations of large-move suppression after a major improvement.
    pub large_move_cooldown_after_improve: u32,
    /// Fraction of the large-move budget given to critical-net focus.
    pub critical_net_rate: f64,
    /// Fractional best-score improvement that counts as major and installs
    /// the cooldown window.
    pub improve_cooldown_fraction: f64,

    /// Smallest cluster a destroy-repair move may pick.
    pub cluster_move_min_size: usize,
    /// Largest cluster a destroy-repair move may pick.
    pub cluster_move_max_size: usize,
    /// Independent repair attempts per large move.
    pub repair_beam_width: u32,

    /// Enable the adaptive operator schedule.
    pub adaptive_ops: bool,
    /// Rolling gain-window length per operator.
    pub adaptive_window: usize,
    /// Iterations run on base weights before adapting.
    pub adaptive_warmup_iterations: u64,
    /// Probability cap per operator.
    pub adaptive_max_operator_prob: f64,
    /// Stagnation length that triggers distribution flattening.
    pub adaptive_stagnation_reset_window: u64,
    /// Blend factor toward the base distribution when flattening.
    pub adaptive_flatten_factor: f64,

    /// Annealing start temperature.
    pub initial_temp: f64,
    /// Geometric cooling factor per outer batch, in (0, 1).
    pub cooling_rate: f64,
    /// Temperature at which annealing stops.
    pub min_temp: f64,
    /// Outer-batch size multiplier.
    pub batch_size: u32,
    /// Inner iterations per temperature unit of a batch.
    pub iter_per_temp: u32,

    /// Deterministic PRNG seed; `None` uses system entropy.
    pub seed: Option<u32>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::normal()
    }
}

impl OptimizerConfig {
    /// Defaults for a single interactive run.
    pub fn normal() -> Self {
        Self {
            mode: Mode::Normal,
            time_budget_ms: None,
            phase1_restarts: 2,
            phase2_attempts: 2,
            local_polish_passes: 1,
            use_exploration_seeds: true,
            elite_pool_size: 8,
            elite_diversity_hash: true,
            elite_min_distance: 1.5,
            persist_elite_archive: false,
            incoming_elite_archive: None,
            large_move_rate: 0.15,
            large_move_rate_early: 0.25,
            large_move_rate_late: 0.08,
            large_move_cooldown_after_improve: 40,
            critical_net_rate: 0.4,
            improve_cooldown_fraction: 0.02,
            cluster_move_min_size: 2,
            cluster_move_max_size: 4,
            repair_beam_width: 1,
            adaptive_ops: true,
            adaptive_window: 24,
            adaptive_warmup_iterations: 120,
            adaptive_max_operator_prob: 0.35,
            adaptive_stagnation_reset_window: 400,
            adaptive_flatten_factor: 0.5,
            initial_temp: 20.0,
            cooling_rate: 0.88,
            min_temp: 1.0,
            batch_size: 3,
            iter_per_temp: 8,
            seed: None,
        }
    }

    /// Defaults for a deep run: more restarts, a bigger archive, a wider
    /// repair beam, and time-budget awareness.
    pub fn deep() -> Self {
        Self {
            mode: Mode::Deep,
            phase1_restarts: 3,
            phase2_attempts: 3,
            local_polish_passes: 2,
            elite_pool_size: 16,
            repair_beam_width: 2,
            cooling_rate: 0.92,
            ..Self::normal()
        }
    }

    /// Coerces every option into its documented range.
    ///
    /// Counts become at least 1 where a zero would stall the pipeline,
    /// probabilities and fractions clamp to `[0, 1]`, the cooling rate
    /// clamps into `(0, 1)`, temperatures become positive with
    /// `min_temp < initial_temp`, and the cluster bounds are ordered.
    /// Invalid values are repaired silently; nothing is rejected.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.phase1_restarts = cfg.phase1_restarts.max(1);
        cfg.phase2_attempts = cfg.phase2_attempts.max(1);
        cfg.elite_pool_size = cfg.elite_pool_size.max(1);
        cfg.elite_min_distance = cfg.elite_min_distance.max(0.0);
        cfg.large_move_rate = cfg.large_move_rate.clamp(0.0, 1.0);
        cfg.large_move_rate_early = cfg.large_move_rate_early.clamp(0.0, 1.0);
        cfg.large_move_rate_late = cfg.large_move_rate_late.clamp(0.0, 1.0);
        cfg.critical_net_rate = cfg.critical_net_rate.clamp(0.0, 1.0);
        cfg.improve_cooldown_fraction = cfg.improve_cooldown_fraction.clamp(0.0, 1.0);
        cfg.cluster_move_min_size = cfg.cluster_move_min_size.max(1);
        cfg.cluster_move_max_size = cfg.cluster_move_max_size.max(cfg.cluster_move_min_size);
        cfg.repair_beam_width = cfg.repair_beam_width.max(1);
        cfg.adaptive_window = cfg.adaptive_window.max(1);
        cfg.adaptive_max_operator_prob = cfg.adaptive_max_operator_prob.clamp(0.01, 1.0);
        cfg.adaptive_stagnation_reset_window = cfg.adaptive_stagnation_reset_window.max(1);
        cfg.adaptive_flatten_factor = cfg.adaptive_flatten_factor.clamp(0.0, 1.0);
        if !(cfg.cooling_rate > 0.0 && cfg.cooling_rate < 1.0) {
            cfg.cooling_rate = Self::normal().cooling_rate;
        }
        if !(cfg.initial_temp > 0.0) {
            cfg.initial_temp = Self::normal().initial_temp;
        }
        if !(cfg.min_temp > 0.0 && cfg.min_temp < cfg.initial_temp) {
            cfg.min_temp = (cfg.initial_temp / 20.0).min(1.0);
        }
        cfg.batch_size = cfg.batch_size.max(1);
        cfg.iter_per_temp = cfg.iter_per_temp.max(1);
        cfg
    }
}
