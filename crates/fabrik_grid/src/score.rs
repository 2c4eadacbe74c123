//! Layout scoring.
//!
//! The objective is a weighted sum over total belt length, bounding-box
//! area, and corner count. The weighted total drives annealing acceptance;
//! the lexicographic order (belts, then area, then corners) guards commit
//! decisions against priority regressions.

use crate::state::GridState;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Weight of total belt length in the combined score.
pub const BELT_WEIGHT: f64 = 1.0;
/// Weight of bounding-box area in the combined score.
pub const AREA_WEIGHT: f64 = 0.5;
/// Weight of corner count in the combined score.
pub const CORNER_WEIGHT: f64 = 0.3;

/// Comparison slack for score components.
pub const SCORE_EPSILON: f64 = 1e-6;

/// A scored layout: raw components plus the weighted total.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Total belt segments across all paths (or the Manhattan proxy).
    pub belts: f64,
    /// Area of the rectangle enclosing every non-empty cell.
    pub area: f64,
    /// Number of belt corners (or the corner proxy).
    pub corners: f64,
    /// Weighted total.
    pub total: f64,
}

impl ScoreBreakdown {
    /// Builds a score from raw components, computing the weighted total.
    pub fn new(belts: f64, area: f64, corners: f64) -> Self {
        Self {
            belts,
            area,
            corners,
            total: BELT_WEIGHT * belts + AREA_WEIGHT * area + CORNER_WEIGHT * corners,
        }
    }

    /// The all-zero score of an empty grid.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Lexicographic order over (belts, area, corners) with epsilon slack.
    pub fn lex_cmp(&self, other: &ScoreBreakdown) -> Ordering {
        for (a, b) in [
            (self.belts, other.belts),
            (self.area, other.area),
            (self.corners, other.corners),
        ] {
            if (a - b).abs() > SCORE_EPSILON {
                return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            }
        }
        Ordering::Equal
    }

    /// Whether this score's weighted total beats `other`'s.
    pub fn better_than(&self, other: &ScoreBreakdown) -> bool {
        self.total < other.total - SCORE_EPSILON
    }
}

impl fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "belts={:.0} area={:.0} corners={:.0} total={:.2}",
            self.belts, self.area, self.corners, self.total
        )
    }
}

/// Scores a routed grid.
///
/// Belt length is the sum of segment counts across all belt paths; the
/// corner count is the number of direction changes between consecutive
/// segments; the area is the rectangle enclosing every non-empty cell
/// (zero for a fully empty grid). Pure function of the grid state.
pub fn evaluate_grid(grid: &GridState) -> ScoreBreakdown {
    let belts: usize = grid.belt_paths().values().map(|p| p.len()).sum();
    let corners: usize = grid.belt_paths().values().map(|p| p.corner_count()).sum();

    let mut bounds: Option<(i32, i32, i32, i32)> = None;
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            if !grid.cell(x, y).is_empty() {
                bounds = Some(match bounds {
                    None => (x, x, y, y),
                    Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
                });
            }
        }
    }
    let area = match bounds {
        Some((x0, x1, y0, y1)) => ((x1 - x0 + 1) as i64 * (y1 - y0 + 1) as i64) as f64,
        None => 0.0,
    };

    ScoreBreakdown::new(belts as f64, area, corners as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belt::{BeltPath, BeltSegment};
    use fabrik_geom::{Direction, MachineKind};

    #[test]
    fn empty_grid_scores_zero() {
        let g = GridState::new(10, 10);
        let score = evaluate_grid(&g);
        assert_eq!(score.belts, 0.0);
        assert_eq!(score.area, 0.0);
        assert_eq!(score.corners, 0.0);
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn single_machine_scores_footprint_area() {
        let mut g = GridState::new(10, 10);
        g.add_machine(MachineKind::Compact, 2, 2, Direction::North).unwrap();
        let score = evaluate_grid(&g);
        assert_eq!(score.belts, 0.0);
        assert_eq!(score.corners, 0.0);
        assert_eq!(score.area, 9.0);
        assert!((score.total - 4.5).abs() < SCORE_EPSILON);
    }

    #[test]
    fn belts_and_corners_counted() {
        let mut g = GridState::new(10, 10);
        let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
        let b = g.add_machine(MachineKind::Compact, 6, 0, Direction::North).unwrap();
        let conn = g.connect(a, 0, b, 0).unwrap();
        g.apply_belt_path(BeltPath {
            connection: conn,
            segments: vec![
                BeltSegment { x: 0, y: 3, from: None, to: Some(Direction::East) },
                BeltSegment { x: 1, y: 3, from: Some(Direction::East), to: Some(Direction::North) },
                BeltSegment { x: 1, y: 2, from: Some(Direction::North), to: None },
            ],
        });
        let score = evaluate_grid(&g);
        assert_eq!(score.belts, 3.0);
        assert_eq!(score.corners, 1.0);
    }

    #[test]
    fn evaluate_is_deterministic() {
        let mut g = GridState::new(20, 20);
        g.add_machine(MachineKind::Heavy, 3, 3, Direction::East).unwrap();
        g.add_machine(MachineKind::Wide, 10, 10, Direction::South).unwrap();
        let a = evaluate_grid(&g);
        let b = evaluate_grid(&g);
        assert_eq!(a, b);
    }

    #[test]
    fn lex_cmp_orders_by_belts_first() {
        let a = ScoreBreakdown::new(10.0, 100.0, 5.0);
        let b = ScoreBreakdown::new(11.0, 50.0, 0.0);
        assert_eq!(a.lex_cmp(&b), Ordering::Less);
        let c = ScoreBreakdown::new(10.0, 90.0, 9.0);
        assert_eq!(a.lex_cmp(&c), Ordering::Greater);
    }

    #[test]
    fn lex_cmp_epsilon_tolerance() {
        let a = ScoreBreakdown::new(10.0, 100.0, 5.0);
        let b = ScoreBreakdown::new(10.0 + 1e-9, 100.0, 5.0);
        assert_eq!(a.lex_cmp(&b), Ordering::Equal);
    }

    #[test]
    fn weighted_total() {
        let s = ScoreBreakdown::new(10.0, 20.0, 5.0);
        assert!((s.total - (10.0 + 10.0 + 1.5)).abs() < SCORE_EPSILON);
    }
}
