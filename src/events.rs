//! Game events triggered by gameplay systems.

use bevy::prelude::*;

use crate::ai::grid::Cell;

/// An enemy reached the player's cell.
#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerCaught {
    pub enemy: Entity,
    pub cell: Cell,
}
