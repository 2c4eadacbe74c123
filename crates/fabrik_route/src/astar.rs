//! Turn-penalized A* search for a single belt.
//!
//! States are `(x, y, incoming direction)` on the 4-connected lattice. A
//! step costs `1 + turn_penalty + crossing_bonus`: turning costs an extra
//! 2, and entering a tile that already carries a belt costs an extra 0.5,
//! which still prefers a clean orthogonal crossing over a multi-tile
//! detour. The heuristic is Manhattan distance.
//!
//! Tile-sharing policy: two belts may share a tile only when neither is a
//! corner there and they run on orthogonal axes. The search enforces this
//! through the effective usage counts (the usage of the connection being
//! rerouted is masked out).

use crate::exclusion::EffectiveUsage;
use fabrik_geom::{Direction, Port};
use fabrik_grid::{BeltPath, BeltSegment, GridState};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Extra cost for a direction change.
const TURN_PENALTY: f64 = 2.0;
/// Extra cost for entering a tile that already carries a belt.
const CROSSING_BONUS: f64 = 0.5;

type SearchKey = (i32, i32, Direction);

/// A search state in the A* priority queue.
#[derive(Debug, Clone)]
struct SearchState {
    x: i32,
    y: i32,
    dir: Direction,
    /// Total cost from start (g-score).
    cost: f64,
    /// Estimated total cost including heuristic (f-score = g + h).
    estimated_total: f64,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.estimated_total == other.estimated_total
    }
}

impl Eq for SearchState {}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default)
        other
            .estimated_total
            .partial_cmp(&self.estimated_total)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds a belt path from `source` (an output port) to `target` (an input
/// port) on the current grid, treating `usage`'s excluded connection as
/// absent.
///
/// The returned path runs from the source port's external tile to the
/// target port's external tile, then a final delivery segment on the
/// target port's own tile. Returns `None` when an endpoint is out of
/// bounds, lands on a machine tile, is corner-occupied, or the search
/// exhausts without reaching the target.
pub(crate) fn search(
    grid: &GridState,
    usage: &EffectiveUsage<'_>,
    source: &Port,
    target: &Port,
) -> Option<BeltPath> {
    let start = source.external_tile();
    let goal = target.external_tile();
    // Delivery direction: the belt's final move into the target port.
    let inward = target.approach.opposite();

    for &(x, y) in &[start, goal] {
        if !grid.in_bounds(x, y) || grid.cell(x, y).is_machine() {
            return None;
        }
        if usage.at((x, y)).corner > 0 {
            return None;
        }
    }

    let start_state = SearchState {
        x: start.0,
        y: start.1,
        dir: source.approach,
        cost: 0.0,
        estimated_total: heuristic(start, goal),
    };

    let mut open = BinaryHeap::new();
    let mut g_scores: HashMap<SearchKey, f64> = HashMap::new();
    let mut came_from: HashMap<SearchKey, SearchKey> = HashMap::new();

    g_scores.insert((start.0, start.1, start_state.dir), 0.0);
    open.push(start_state);

    while let Some(current) = open.pop() {
        let key = (current.x, current.y, current.dir);
        if (current.x, current.y) == goal && delivery_ok(usage, goal, current.dir, inward) {
            return Some(reconstruct(&came_from, key, start, target, inward));
        }

        let current_g = *g_scores.get(&key).unwrap_or(&f64::INFINITY);
        if current.cost > current_g {
            continue; // Stale entry
        }

        let here = usage.at((current.x, current.y));
        for next_dir in Direction::ALL {
            let (dx, dy) = next_dir.delta();
            let (nx, ny) = (current.x + dx, current.y + dy);
            if !grid.in_bounds(nx, ny) || grid.cell(nx, ny).is_machine() {
                continue;
            }
            let turning = next_dir != current.dir;
            // Leaving along an axis another belt already runs on, or
            // turning on an occupied tile, would merge belts.
            if here.along(next_dir.axis()) > 0 || (turning && here.any()) {
                continue;
            }
            let there = usage.at((nx, ny));
            if there.corner > 0 || there.along(next_dir.axis()) > 0 {
                continue;
            }

            let step = 1.0
                + if turning { TURN_PENALTY } else { 0.0 }
                + if there.any() { CROSSING_BONUS } else { 0.0 };
            let tentative = current.cost + step;
            let next_key = (nx, ny, next_dir);
            if tentative < *g_scores.get(&next_key).unwrap_or(&f64::INFINITY) {
                g_scores.insert(next_key, tentative);
                came_from.insert(next_key, key);
                open.push(SearchState {
                    x: nx,
                    y: ny,
                    dir: next_dir,
                    cost: tentative,
                    estimated_total: tentative + heuristic((nx, ny), goal),
                });
            }
        }
    }

    None
}

/// Whether the final delivery turn at the goal tile is legal.
///
/// Arriving aligned with the delivery direction is always fine; arriving
/// across it makes the goal tile a corner, which must not coexist with any
/// other usage there.
fn delivery_ok(usage: &EffectiveUsage<'_>, goal: (i32, i32), arrived: Direction, inward: Direction) -> bool {
    arrived == inward || usage.at(goal).is_zero()
}

/// Manhattan distance heuristic.
fn heuristic(from: (i32, i32), to: (i32, i32)) -> f64 {
    fabrik_geom::manhattan(from, to) as f64
}

/// Rebuilds the segment list from the came-from chain, then appends the
/// delivery segment on the target port's own tile.
fn reconstruct(
    came_from: &HashMap<SearchKey, SearchKey>,
    goal_key: SearchKey,
    start: (i32, i32),
    target: &Port,
    inward: Direction,
) -> BeltPath {
    let mut chain = vec![goal_key];
    let mut current = goal_key;
    while let Some(&prev) = came_from.get(&current) {
        chain.push(prev);
        current = prev;
    }
    debug_assert_eq!((current.0, current.1), start);
    chain.reverse();

    let mut segments = Vec::with_capacity(chain.len() + 1);
    for (i, &(x, y, _)) in chain.iter().enumerate() {
        let from = if i == 0 { None } else { Some(chain[i].2) };
        let to = if i + 1 < chain.len() {
            Some(chain[i + 1].2)
        } else {
            Some(inward)
        };
        segments.push(BeltSegment { x, y, from, to });
    }
    segments.push(BeltSegment {
        x: target.x,
        y: target.y,
        from: Some(inward),
        to: None,
    });

    BeltPath {
        connection: target_connection_placeholder(),
        segments,
    }
}

// The caller stamps the real connection id; reconstruction is agnostic.
fn target_connection_placeholder() -> fabrik_geom::ConnectionId {
    fabrik_geom::ConnectionId::from_raw(u32::MAX)
}
