//! Grid model for the Fabrik layout toolkit.
//!
//! Owns the 2D cell matrix, machine placement and removal, the connection
//! registry, belt paths with per-tile usage accounting, and layout scoring.
//! The routing engine (`fabrik_route`) searches over this state; the
//! optimizer (`fabrik_opt`) mutates candidate layouts and scores them here.

#![warn(missing_docs)]

pub mod belt;
pub mod cell;
pub mod score;
pub mod state;
pub mod usage;

pub use belt::{BeltPath, BeltSegment};
pub use cell::Cell;
pub use score::{
    evaluate_grid, ScoreBreakdown, AREA_WEIGHT, BELT_WEIGHT, CORNER_WEIGHT, SCORE_EPSILON,
};
pub use state::{ConnectError, GridState};
pub use usage::{TileUsage, UsageMap};
