//! Player spawning, input handling and movement.
//!
//! The player is the pursuit target: its `GridCell` is what every enemy
//! plans toward.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::ai::grid::Grid;
use crate::app_state::{AppState, PlayingState};
use crate::components::*;
use crate::plugins::level::{LevelMap, cell_to_pixel, pixel_to_cell};
use crate::plugins::telemetry::GameSet;
use crate::settings::{PlayerConfig, PursuitConfig};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::InGame), spawn_player);
        app.add_systems(
            Update,
            (player_input, move_player.after(player_input))
                .in_set(GameSet::Input)
                .run_if(in_state(PlayingState::Playing)),
        );
        app.add_systems(
            Update,
            toggle_pause.run_if(in_state(AppState::InGame)),
        );
    }
}

const PLAYER_COLOR: Color = Color::srgb(0.3, 0.8, 1.0);

/// Spawn the player entity at the level's player spawn.
#[span_fn]
pub fn spawn_player(
    mut commands: Commands,
    level: Res<LevelMap>,
    config: Res<PursuitConfig>,
    player: Res<PlayerConfig>,
) {
    let cell = level.player_spawn;
    let pixel = cell_to_pixel(cell, config.cell_size as i32);
    let world = level.pixel_to_world(pixel, config.cell_size);

    commands.spawn((
        Player,
        PixelPosition(pixel),
        GridCell(cell),
        SpawnCell(cell),
        MoveSpeed(player.walk_speed),
        SubPixel::default(),
        InputDirection::default(),
        LevelEntity,
        Sprite::from_color(PLAYER_COLOR, Vec2::splat(config.cell_size as f32 * 0.8)),
        Transform::from_xyz(world.x, world.y, 10.0),
    ));
}

/// Read keyboard input into a unit direction (or none).
#[span_fn]
fn player_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut query: Query<&mut InputDirection, With<Player>>,
) {
    let mut dir = Vec2::ZERO;
    if keyboard.pressed(KeyCode::ArrowUp) || keyboard.pressed(KeyCode::KeyW) {
        dir.y -= 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowDown) || keyboard.pressed(KeyCode::KeyS) {
        dir.y += 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowLeft) || keyboard.pressed(KeyCode::KeyA) {
        dir.x -= 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowRight) || keyboard.pressed(KeyCode::KeyD) {
        dir.x += 1.0;
    }

    for mut input in &mut query {
        input.0 = (dir != Vec2::ZERO).then(|| dir.normalize());
    }
}

/// Move the player in pixel space. Each axis is tried separately so the
/// player slides along walls instead of sticking to them.
#[allow(clippy::type_complexity)]
#[span_fn]
fn move_player(
    time: Res<Time>,
    level: Res<LevelMap>,
    config: Res<PursuitConfig>,
    mut query: Query<
        (&InputDirection, &MoveSpeed, &mut SubPixel, &mut PixelPosition),
        With<Player>,
    >,
) {
    let delta_time = time.delta_secs() * config.frame_rate_scale;
    let cell_size = config.cell_size as i32;

    for (input, speed, mut sub_pixel, mut position) in &mut query {
        let Some(dir) = input.0 else {
            sub_pixel.0 = Vec2::ZERO;
            continue;
        };

        sub_pixel.0 += dir * speed.0 * delta_time;
        let whole = sub_pixel.0.trunc();
        sub_pixel.0 -= whole;
        let step = whole.as_ivec2();

        let moved_x = position.0 + IVec2::new(step.x, 0);
        if box_is_open(&level.grid, moved_x, cell_size) {
            position.0 = moved_x;
        }
        let moved_y = position.0 + IVec2::new(0, step.y);
        if box_is_open(&level.grid, moved_y, cell_size) {
            position.0 = moved_y;
        }
    }
}

/// True when a cell-sized box with top-left `pixel` only overlaps open cells.
pub fn box_is_open(grid: &Grid, pixel: IVec2, cell_size: i32) -> bool {
    let far = pixel + IVec2::splat(cell_size - 1);
    [
        pixel,
        IVec2::new(far.x, pixel.y),
        IVec2::new(pixel.x, far.y),
        far,
    ]
    .into_iter()
    .all(|corner| grid.is_open(pixel_to_cell(corner, cell_size)))
}

/// Escape toggles between Playing and Paused.
fn toggle_pause(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<PlayingState>>,
    mut next_state: ResMut<NextState<PlayingState>>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }
    match state.get() {
        PlayingState::Playing => next_state.set(PlayingState::Paused),
        PlayingState::Paused => next_state.set(PlayingState::Playing),
        PlayingState::PlayerDeath => {}
    }
}
