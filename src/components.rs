use bevy::prelude::*;

use crate::ai::grid::Cell;
use crate::ai::pursuer::PursuerController;

// ---------------------------------------------------------------------------
// Grid and spatial
// ---------------------------------------------------------------------------

/// Top-left corner in level pixels, `(0, 0)` at the top-left of the map and
/// y growing downwards. Gameplay logic works on this; `Transform` is derived.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelPosition(pub IVec2);

/// Grid cell containing the entity's `PixelPosition`, refreshed every frame.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridCell(pub Cell);

/// Spawn cell for respawning after the player is caught.
#[derive(Component, Debug, Clone, Copy)]
pub struct SpawnCell(pub Cell);

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Pixels per reference frame.
#[derive(Component, Debug, Clone, Copy)]
pub struct MoveSpeed(pub f32);

/// Fractional pixels not yet applied to `PixelPosition` (player only; enemies
/// carry theirs inside the controller).
#[derive(Component, Debug, Default)]
pub struct SubPixel(pub Vec2);

/// Buffered input direction (player only).
#[derive(Component, Debug, Default)]
pub struct InputDirection(pub Option<Vec2>);

// ---------------------------------------------------------------------------
// Entity markers
// ---------------------------------------------------------------------------

#[derive(Component, Debug)]
pub struct Player;

#[derive(Component, Debug)]
pub struct Enemy;

/// The enemy's pursuit controller.
#[derive(Component, Debug, Deref, DerefMut)]
pub struct Pursuer(pub PursuerController);

#[derive(Component, Debug)]
pub struct Wall;

/// Marker for entities that belong to the loaded level (despawned when
/// leaving the game).
#[derive(Component, Debug)]
pub struct LevelEntity;
