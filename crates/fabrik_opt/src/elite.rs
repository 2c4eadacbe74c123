//! The elite archive: a capped pool of high-quality, distinct layouts
//! used to seed restarts.
//!
//! Entries are kept sorted by routed score. A fingerprint hash blocks
//! exact duplicates and a minimum diversity distance keeps near-clones of
//! better entries out, so restarts sample genuinely different basins.

use crate::candidate::Candidate;
use crate::config::{EliteSnapshot, OptimizerConfig};
use crate::rng::Lcg32;
use fabrik_layout::{diversity_distance, LayoutFile};

/// Exponent biasing restart sampling toward the top of the archive.
const SAMPLE_BIAS: f64 = 1.6;

/// One archived layout.
#[derive(Clone, Debug)]
pub struct EliteEntry {
    /// The layout snapshot.
    pub candidate: Candidate,
    /// Routed total score.
    pub score: f64,
    /// Pose fingerprint, for duplicate rejection.
    pub fingerprint: String,
}

/// The size-capped elite pool.
#[derive(Clone, Debug)]
pub struct EliteArchive {
    entries: Vec<EliteEntry>,
    capacity: usize,
    dedup_by_fingerprint: bool,
    min_distance: f64,
}

impl EliteArchive {
    /// Creates an empty archive shaped by the config.
    pub fn new(cfg: &OptimizerConfig) -> Self {
        Self {
            entries: Vec::new(),
            capacity: cfg.elite_pool_size,
            dedup_by_fingerprint: cfg.elite_diversity_hash,
            min_distance: cfg.elite_min_distance,
        }
    }

    /// Number of archived layouts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best archived score, if any.
    pub fn best_score(&self) -> Option<f64> {
        self.entries.first().map(|e| e.score)
    }

    /// Entries in score order (best first).
    pub fn entries(&self) -> &[EliteEntry] {
        &self.entries
    }

    /// Offers a routed layout. Returns whether it was admitted.
    pub fn offer(&mut self, candidate: &Candidate, score: f64) -> bool {
        let fingerprint = candidate.fingerprint();
        if self.dedup_by_fingerprint {
            if let Some(existing) = self.entries.iter_mut().find(|e| e.fingerprint == fingerprint) {
                if score < existing.score {
                    existing.score = score;
                    existing.candidate = candidate.clone();
                    self.entries.sort_by(|a, b| a.score.total_cmp(&b.score));
                    return true;
                }
                return false;
            }
        }
        if self.min_distance > 0.0 {
            let too_close = self.entries.iter().any(|e| {
                e.score <= score
                    && diversity_distance(&e.candidate.machines, &candidate.machines)
                        < self.min_distance
            });
            if too_close {
                return false;
            }
        }
        if self.entries.len() >= self.capacity {
            match self.entries.last() {
                Some(worst) if worst.score <= score => return false,
                _ => {
                    self.entries.pop();
                }
            }
        }
        self.entries.push(EliteEntry {
            candidate: candidate.clone(),
            score,
            fingerprint,
        });
        self.entries.sort_by(|a, b| a.score.total_cmp(&b.score));
        true
    }

    /// Samples an entry with bias toward the top: index
    /// `⌊rand()^1.6 · len⌋`.
    pub fn sample(&self, rng: &mut Lcg32) -> Option<&EliteEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let i = (rng.next_f64().powf(SAMPLE_BIAS) * self.entries.len() as f64) as usize;
        self.entries.get(i.min(self.entries.len() - 1))
    }

    /// Exports the archive for cross-invocation persistence.
    pub fn to_snapshots(&self) -> Vec<EliteSnapshot> {
        self.entries
            .iter()
            .filter_map(|e| {
                let grid = e.candidate.build_grid()?;
                Some(EliteSnapshot {
                    layout: LayoutFile::from_grid(&grid),
                    score: e.score,
                })
            })
            .collect()
    }

    /// Imports persisted entries through the normal admission rules.
    /// Snapshots that fail to rebuild are dropped.
    pub fn absorb_snapshots(&mut self, snapshots: &[EliteSnapshot]) {
        for snap in snapshots {
            if let Ok(grid) = snap.layout.to_grid() {
                let candidate = Candidate::from_grid(&grid);
                self.offer(&candidate, snap.score);
            }
        }
    }
}
