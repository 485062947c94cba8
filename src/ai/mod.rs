//! Enemy pursuit AI, independent of the ECS.
//!
//! `grid` holds the static obstacle map, `pathfinder` searches it, and
//! `pursuer` decides when to search and walks the result.

pub mod grid;
pub mod pathfinder;
pub mod pursuer;

pub use grid::{Cell, Grid, GridError, Tile};
pub use pathfinder::{AStarPlanner, RoutePlanner};
pub use pursuer::{Facing, PursuerController, PursuitState, ReplanOutcome};
