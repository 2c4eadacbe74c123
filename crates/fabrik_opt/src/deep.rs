//! The deep-search continuous loop.
//!
//! Chains fixed-budget optimizer invocations, carrying the elite archive
//! between chunks, until a stop is requested or no improvement has landed
//! within the plateau window. Chunks are the only unit of work: the loop
//! never interrupts an invocation mid-phase, so every observable state is
//! a complete layout.

use crate::config::{EliteSnapshot, Mode, OptimizerConfig};
use crate::control::OptimizeControl;
use crate::run_optimizer;
use fabrik_grid::{evaluate_grid, GridState, ScoreBreakdown, SCORE_EPSILON};
use std::time::{Duration, Instant};

/// Where the loop currently stands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeepSearchState {
    /// A chunk is executing.
    RunningChunk,
    /// Waiting for the next chunk.
    BetweenChunks,
    /// A stop was requested; the loop winds down at the next boundary.
    StopRequested,
    /// The plateau window expired with no improvement.
    AutoPlateauStop,
    /// The loop has finished; the best layout is final.
    Done,
}

/// The chunked deep-search driver.
pub struct DeepSearch {
    grid: GridState,
    config: OptimizerConfig,
    state: DeepSearchState,
    best_grid: GridState,
    best_score: ScoreBreakdown,
    best_routable: bool,
    archive: Option<Vec<EliteSnapshot>>,
    last_improvement: Instant,
    plateau: Duration,
    chunks_completed: u32,
    total_iterations: u64,
}

impl DeepSearch {
    /// Creates a loop over `grid`. `plateau` is the wall-clock idle window
    /// after which the loop auto-stops.
    pub fn new(grid: GridState, config: OptimizerConfig, plateau: Duration) -> Self {
        let mut config = config.normalized();
        config.mode = Mode::Deep;
        config.persist_elite_archive = true;
        // The routed baseline anchors the best-so-far; chunk results are
        // compared against routed totals, never the bare input grid.
        let (best_grid, best_score, baseline_routable) =
            match crate::Candidate::from_grid(&grid).routed() {
                Some((routed, score)) => (routed, score, true),
                None => (grid.clone(), evaluate_grid(&grid), false),
            };
        Self {
            best_grid,
            best_routable: baseline_routable,
            grid,
            config,
            state: DeepSearchState::BetweenChunks,
            best_score,
            archive: None,
            last_improvement: Instant::now(),
            plateau,
            chunks_completed: 0,
            total_iterations: 0,
        }
    }

    /// Current loop state.
    pub fn state(&self) -> DeepSearchState {
        self.state
    }

    /// Chunks completed so far.
    pub fn chunks_completed(&self) -> u32 {
        self.chunks_completed
    }

    /// Total inner iterations across all chunks.
    pub fn total_iterations(&self) -> u64 {
        self.total_iterations
    }

    /// Best layout and score found so far.
    pub fn best(&self) -> (&GridState, ScoreBreakdown) {
        (&self.best_grid, self.best_score)
    }

    /// Asks the loop to stop at the next chunk boundary.
    pub fn request_stop(&mut self) {
        if self.state != DeepSearchState::Done {
            self.state = DeepSearchState::StopRequested;
        }
    }

    /// Runs one chunk (or winds down). Returns the state after the step.
    pub fn step(&mut self) -> DeepSearchState {
        match self.state {
            DeepSearchState::Done => return self.state,
            DeepSearchState::StopRequested | DeepSearchState::AutoPlateauStop => {
                self.state = DeepSearchState::Done;
                return self.state;
            }
            DeepSearchState::BetweenChunks | DeepSearchState::RunningChunk => {}
        }
        if self.chunks_completed > 0 && self.last_improvement.elapsed() >= self.plateau {
            self.state = DeepSearchState::AutoPlateauStop;
            return self.state;
        }

        self.state = DeepSearchState::RunningChunk;
        let mut cfg = self.config.clone();
        cfg.incoming_elite_archive = self.archive.take();
        // Each chunk explores a fresh stream.
        cfg.seed = self.config.seed.map(|s| s.wrapping_add(self.chunks_completed));

        let outcome = run_optimizer(&self.grid, &cfg, OptimizeControl::default());
        self.total_iterations += outcome.iterations;
        self.archive = outcome.elite_archive;
        let chunk_routable =
            outcome.grid.belt_paths().len() == outcome.grid.connections().len();
        let improved = if self.best_routable {
            chunk_routable && outcome.score.total < self.best_score.total - SCORE_EPSILON
        } else {
            // Any fully routed result beats an unroutable baseline.
            chunk_routable || outcome.score.total < self.best_score.total - SCORE_EPSILON
        };
        if improved {
            self.best_score = outcome.score;
            self.best_grid = outcome.grid;
            self.best_routable = chunk_routable;
            self.last_improvement = Instant::now();
        }
        self.chunks_completed += 1;
        self.state = DeepSearchState::BetweenChunks;
        self.state
    }

    /// Steps until the loop is done, then returns the best layout.
    pub fn run_to_completion(mut self) -> (GridState, ScoreBreakdown) {
        while self.state != DeepSearchState::Done {
            self.step();
        }
        (self.best_grid, self.best_score)
    }
}
