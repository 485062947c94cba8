//! Per-agent pursuit state: when to replan and how to walk the active route.
//!
//! Positions are integer pixels with `(0, 0)` at the top-left corner of the
//! level; a cell's pixel position is its top-left corner. Movement is
//! accumulated as floats and only whole pixels are applied, the fractional
//! remainder carrying over to the next tick.

use std::collections::VecDeque;

use bevy::math::{IVec2, Vec2};
use micromegas_tracing::prelude::*;

use super::grid::{Cell, Grid};
use super::pathfinder::{AStarPlanner, RoutePlanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PursuitState {
    Idle,
    Following,
}

/// Horizontal facing derived from accumulated movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// What a replan request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanOutcome {
    /// Target unchanged since the last search; nothing ran.
    Suppressed,
    /// A route was found and installed. Carries the installed length.
    Installed(usize),
    /// The search found no route; the previous route is kept.
    NoRoute,
}

/// Top-left pixel of `cell`.
pub fn cell_to_pixel(cell: Cell, cell_size: i32) -> IVec2 {
    IVec2::new(cell.col * cell_size, cell.row * cell_size)
}

/// Cell containing `pixel`, dividing both axes by the same cell size.
pub fn pixel_to_cell(pixel: IVec2, cell_size: i32) -> Cell {
    Cell::new(pixel.y.div_euclid(cell_size), pixel.x.div_euclid(cell_size))
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PursuerController<P: RoutePlanner = AStarPlanner> {
    planner: P,
    position: IVec2,
    accumulator: Vec2,
    route: VecDeque<Cell>,
    last_planned_target: Option<Cell>,
    speed: f32,
    cell_size: i32,
    facing: Facing,
}

impl<P: RoutePlanner> PursuerController<P> {
    /// Create an idle controller at `position` (pixels).
    ///
    /// `speed` is in pixels per unit of the delta-time passed to
    /// [`advance`](Self::advance).
    pub fn new(planner: P, position: IVec2, speed: f32, cell_size: u32) -> Self {
        Self {
            planner,
            position,
            accumulator: Vec2::ZERO,
            route: VecDeque::new(),
            last_planned_target: None,
            speed,
            cell_size: cell_size.max(1) as i32,
            facing: Facing::default(),
        }
    }

    /// Create an idle controller standing on the top-left pixel of `cell`.
    pub fn at_cell(planner: P, cell: Cell, speed: f32, cell_size: u32) -> Self {
        let cell_size = cell_size.max(1);
        Self::new(
            planner,
            cell_to_pixel(cell, cell_size as i32),
            speed,
            cell_size,
        )
    }

    pub fn state(&self) -> PursuitState {
        if self.route.is_empty() {
            PursuitState::Idle
        } else {
            PursuitState::Following
        }
    }

    pub fn position(&self) -> IVec2 {
        self.position
    }

    /// Fractional movement not yet applied to [`position`](Self::position).
    pub fn accumulator(&self) -> Vec2 {
        self.accumulator
    }

    /// Cell containing the current pixel position.
    pub fn cell(&self) -> Cell {
        pixel_to_cell(self.position, self.cell_size)
    }

    /// Remaining cells to visit, head first. Never contains the cell the
    /// route was planned from.
    pub fn route(&self) -> impl ExactSizeIterator<Item = &Cell> {
        self.route.iter()
    }

    pub fn last_planned_target(&self) -> Option<Cell> {
        self.last_planned_target
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Teleport to `position`, dropping the route, the accumulator and the
    /// replan memory.
    pub fn reset_to(&mut self, position: IVec2) {
        self.position = position;
        self.accumulator = Vec2::ZERO;
        self.route.clear();
        self.last_planned_target = None;
    }

    /// Move to `position` without touching the route.
    pub fn set_position(&mut self, position: IVec2) {
        self.position = position;
    }

    /// Plan toward `target` if it moved since the last plan.
    ///
    /// A found route replaces the current one in a single assignment, with
    /// its first cell (`self_cell`) removed. A failed search keeps the old
    /// route.
    pub fn request_replan(
        &mut self,
        grid: &Grid,
        self_cell: Cell,
        target: Cell,
        threats: &[Cell],
    ) -> ReplanOutcome {
        if self.last_planned_target == Some(target) {
            return ReplanOutcome::Suppressed;
        }
        if !grid.is_open(self_cell) {
            warn!("pursuit: refusing to plan from non-walkable cell {self_cell}");
            return ReplanOutcome::NoRoute;
        }
        self.last_planned_target = Some(target);

        let found = self.planner.search(grid, self_cell, target, threats);
        if found.is_empty() {
            debug!("pursuit: no route from {self_cell} to {target}");
            return ReplanOutcome::NoRoute;
        }

        self.route = found.into_iter().skip(1).collect();
        imetric!("pursuit_route_len", "count", self.route.len() as u64);
        debug!(
            "pursuit: {} cells from {self_cell} to {target}",
            self.route.len()
        );
        ReplanOutcome::Installed(self.route.len())
    }

    /// Step toward the head of the route.
    ///
    /// `delta_time` scales the per-tick distance (`speed * delta_time`). A
    /// step that would reach or pass the head's top-left pixel lands exactly
    /// on it instead, dropping the fractional remainder. The head is removed
    /// once the agent's cell equals it; when the last cell is removed the
    /// replan memory is cleared so the next request searches again.
    pub fn advance(&mut self, delta_time: f32) {
        let Some(&head) = self.route.front() else {
            return;
        };

        let target = cell_to_pixel(head, self.cell_size);
        let to_head = target.as_vec2() - (self.position.as_vec2() + self.accumulator);
        let distance = to_head.length();
        let step = self.speed * delta_time;

        if distance <= step {
            self.turn_toward(to_head.x);
            self.position = target;
            self.accumulator = Vec2::ZERO;
        } else if distance > 0.0 {
            self.accumulator += to_head / distance * step;
            self.turn_toward(self.accumulator.x);

            let whole = self.accumulator.trunc();
            self.position += whole.as_ivec2();
            self.accumulator -= whole;
        }

        if self.cell() == head {
            self.route.pop_front();
            if self.route.is_empty() {
                self.last_planned_target = None;
            }
        }
    }

    fn turn_toward(&mut self, dx: f32) {
        if dx < 0.0 {
            self.facing = Facing::Left;
        } else if dx > 0.0 {
            self.facing = Facing::Right;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
