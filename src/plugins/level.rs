//! Level loading, rendering, and the obstacle grid.
//!
//! Parses ASCII level files into the pathfinding `Grid` plus spawn cells, and
//! converts between grid cells, level pixels and Bevy world space.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use micromegas_tracing::prelude::*;
use pathfinding::prelude::bfs_reach;

use crate::ai::grid::{Cell, Grid, GridError, Tile};
use crate::ai::pathfinder::neighbours;
use crate::app_state::AppState;
use crate::components::{LevelEntity, Wall};
use crate::resources::LevelSource;
use crate::settings::PursuitConfig;

pub use crate::ai::pursuer::{cell_to_pixel, pixel_to_cell};

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelSource>();
        app.add_systems(OnEnter(AppState::Loading), load_level);
        app.add_systems(OnEnter(AppState::InGame), spawn_level_tiles);
        app.add_systems(OnExit(AppState::InGame), despawn_level_entities);
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const WALL_COLOR: Color = Color::srgb(0.2, 0.18, 0.3);
const FLOOR_COLOR: Color = Color::srgb(0.05, 0.05, 0.08);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("failed to read level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("no player spawn ('P') found in level")]
    MissingPlayerSpawn,

    #[error("second player spawn at {0}")]
    DuplicatePlayerSpawn(Cell),
}

// ---------------------------------------------------------------------------
// Level map resource
// ---------------------------------------------------------------------------

/// The loaded level: static obstacles and spawn cells.
#[derive(Resource, Debug, Clone)]
pub struct LevelMap {
    pub grid: Grid,
    pub player_spawn: Cell,
    pub enemy_spawns: Vec<Cell>,
}

impl LevelMap {
    /// Parse an ASCII level.
    ///
    /// `#` is blocked, `.` and space are open, `P` marks the single player
    /// spawn and `E` marks enemy spawns. Short rows are padded with open
    /// cells; trailing blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, LevelError> {
        let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
        let height = lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(0, |last| last + 1);
        let width = lines[..height]
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0);

        let mut player_spawn = None;
        let mut enemy_spawns = Vec::new();
        let mut rows = Vec::with_capacity(height);

        for (row, line) in lines[..height].iter().enumerate() {
            let mut flags = vec![0u8; width];
            for (col, ch) in line.chars().enumerate() {
                let cell = Cell::new(row as i32, col as i32);
                match ch {
                    '#' => flags[col] = 1,
                    '.' | ' ' => {}
                    'P' => {
                        if player_spawn.is_some() {
                            return Err(LevelError::DuplicatePlayerSpawn(cell));
                        }
                        player_spawn = Some(cell);
                    }
                    'E' => enemy_spawns.push(cell),
                    _ => return Err(GridError::UnknownChar { ch, row, col }.into()),
                }
            }
            rows.push(flags);
        }

        let grid = Grid::from_flags(&rows)?;
        let player_spawn = player_spawn.ok_or(LevelError::MissingPlayerSpawn)?;

        Ok(Self {
            grid,
            player_spawn,
            enemy_spawns,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Enemy spawns from which the player spawn cannot be reached.
    pub fn unreachable_spawns(&self) -> Vec<Cell> {
        let reachable: HashSet<Cell> =
            bfs_reach(self.player_spawn, |&cell| {
                neighbours(&self.grid, cell).map(|(next, _)| next)
            })
            .collect();
        self.enemy_spawns
            .iter()
            .copied()
            .filter(|spawn| !reachable.contains(spawn))
            .collect()
    }

    /// World-space centre of the cell whose top-left pixel is `pixel`.
    /// World Y is flipped (positive up) and the map is centred on the origin.
    pub fn pixel_to_world(&self, pixel: IVec2, cell_size: u32) -> Vec2 {
        let size = cell_size as f32;
        let half_w = self.width() as f32 * size / 2.0;
        let half_h = self.height() as f32 * size / 2.0;
        Vec2::new(
            pixel.x as f32 + size / 2.0 - half_w,
            -(pixel.y as f32 + size / 2.0 - half_h),
        )
    }

    pub fn cell_to_world(&self, cell: Cell, cell_size: u32) -> Vec2 {
        self.pixel_to_world(cell_to_pixel(cell, cell_size as i32), cell_size)
    }
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Load the level named by `LevelSource`, then enter the game.
///
/// A `LevelMap` inserted before startup is used as is.
fn load_level(
    mut commands: Commands,
    source: Res<LevelSource>,
    preloaded: Option<Res<LevelMap>>,
    mut next_state: ResMut<NextState<AppState>>,
    mut exit: MessageWriter<AppExit>,
) {
    span_scope!("level_load");

    let unreachable = match preloaded {
        Some(level) => level.unreachable_spawns(),
        None => match LevelMap::load(&source.0) {
            Ok(level) => {
                info!(
                    "level loaded: {} ({}x{}, {} enemies)",
                    source.0.display(),
                    level.width(),
                    level.height(),
                    level.enemy_spawns.len()
                );
                let unreachable = level.unreachable_spawns();
                commands.insert_resource(level);
                unreachable
            }
            Err(e) => {
                error!("failed to load level {}: {e}", source.0.display());
                exit.write(AppExit::error());
                return;
            }
        },
    };

    for spawn in unreachable {
        warn!("enemy spawn {spawn} cannot reach the player spawn");
    }

    next_state.set(AppState::InGame);
}

/// Spawn a sprite per tile.
fn spawn_level_tiles(mut commands: Commands, level: Res<LevelMap>, config: Res<PursuitConfig>) {
    let size = Vec2::splat(config.cell_size as f32);
    for index in 0..level.grid.len() {
        let cell = level.grid.cell_at(index);
        let world = level.cell_to_world(cell, config.cell_size);
        let transform = Transform::from_xyz(world.x, world.y, 0.0);
        match level.grid.tile(cell) {
            Some(Tile::Blocked) => {
                commands.spawn((
                    Wall,
                    LevelEntity,
                    Sprite::from_color(WALL_COLOR, size),
                    transform,
                ));
            }
            _ => {
                commands.spawn((LevelEntity, Sprite::from_color(FLOOR_COLOR, size), transform));
            }
        }
    }
}

fn despawn_level_entities(mut commands: Commands, query: Query<Entity, With<LevelEntity>>) {
    for entity in &query {
        commands.entity(entity).despawn();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
