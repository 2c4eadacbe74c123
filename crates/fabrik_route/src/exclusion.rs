//! Usage masking for reroutes.
//!
//! When a connection is rerouted, its existing belt must not block its own
//! search. [`EffectiveUsage`] answers per-tile usage queries with the
//! excluded connection's segments subtracted out.

use fabrik_geom::ConnectionId;
use fabrik_grid::{GridState, TileUsage};
use std::collections::HashMap;

/// Per-tile usage with one connection's contribution masked out.
pub(crate) struct EffectiveUsage<'a> {
    grid: &'a GridState,
    excluded: HashMap<(i32, i32), TileUsage>,
}

impl<'a> EffectiveUsage<'a> {
    /// Builds the mask for `exclude`'s current path (empty when the
    /// connection has no routed belt).
    pub(crate) fn new(grid: &'a GridState, exclude: ConnectionId) -> Self {
        let mut excluded: HashMap<(i32, i32), TileUsage> = HashMap::new();
        if let Some(path) = grid.belt_path(exclude) {
            for seg in &path.segments {
                let entry = excluded.entry(seg.tile()).or_default();
                if seg.is_corner() {
                    entry.corner += 1;
                } else {
                    match seg.axis() {
                        Some(fabrik_geom::Axis::Horizontal) => entry.horizontal += 1,
                        Some(fabrik_geom::Axis::Vertical) => entry.vertical += 1,
                        None => {}
                    }
                }
            }
        }
        Self { grid, excluded }
    }

    /// Effective usage at a tile.
    pub(crate) fn at(&self, tile: (i32, i32)) -> TileUsage {
        let total = self.grid.usage_at(tile);
        match self.excluded.get(&tile) {
            Some(masked) => total.saturating_sub(masked),
            None => total,
        }
    }
}
