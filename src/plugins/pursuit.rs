//! Enemy spawning, replanning cadence, movement, collision with the player,
//! and death handling.
//!
//! Each enemy owns a `PursuerController`. Replans run on a repeating timer;
//! movement runs every frame with the frame delta scaled to reference frames.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::ai::grid::Cell;
use crate::ai::pathfinder::AStarPlanner;
use crate::ai::pursuer::{Facing, PursuerController, ReplanOutcome};
use crate::app_state::{AppState, PlayingState};
use crate::components::*;
use crate::events::PlayerCaught;
use crate::plugins::level::{LevelMap, cell_to_pixel, pixel_to_cell};
use crate::plugins::telemetry::GameSet;
use crate::resources::{GameStats, Lives};
use crate::settings::PursuitConfig;

pub struct PursuitPlugin;

impl Plugin for PursuitPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(AppState::InGame),
            (spawn_enemies, init_replan_timer),
        );
        app.add_systems(
            Update,
            (
                track_cells,
                replan_pursuers,
                advance_pursuers,
                enemy_player_collision,
            )
                .chain()
                .in_set(GameSet::Pursuit)
                .run_if(in_state(PlayingState::Playing)),
        );
        app.add_systems(
            Update,
            sync_transforms
                .in_set(GameSet::Presentation)
                .run_if(in_state(AppState::InGame)),
        );
        app.add_systems(OnEnter(PlayingState::PlayerDeath), handle_player_death);
        app.add_systems(OnExit(AppState::InGame), remove_replan_timer);
        app.add_observer(on_player_caught);
    }
}

const ENEMY_COLOR: Color = Color::srgb(0.9, 0.25, 0.2);

/// Repeating timer that paces replans.
#[derive(Resource, Deref, DerefMut)]
pub struct ReplanTimer(pub Timer);

/// Fresh idle controller standing on `cell`.
pub fn new_controller(config: &PursuitConfig, cell: Cell) -> PursuerController {
    PursuerController::at_cell(
        AStarPlanner::new(config.danger_radius),
        cell,
        config.agent_speed,
        config.cell_size,
    )
}

/// Spawn a pursuer on every enemy spawn cell.
#[span_fn]
pub fn spawn_enemies(mut commands: Commands, level: Res<LevelMap>, config: Res<PursuitConfig>) {
    let size = Vec2::splat(config.cell_size as f32 * 0.8);
    for &cell in &level.enemy_spawns {
        let controller = new_controller(&config, cell);
        let pixel = controller.position();
        let world = level.pixel_to_world(pixel, config.cell_size);
        commands.spawn((
            Enemy,
            PixelPosition(pixel),
            GridCell(cell),
            SpawnCell(cell),
            Pursuer(controller),
            LevelEntity,
            Sprite::from_color(ENEMY_COLOR, size),
            Transform::from_xyz(world.x, world.y, 10.0),
        ));
    }
    info!("spawned {} pursuers", level.enemy_spawns.len());
}

fn init_replan_timer(mut commands: Commands, config: Res<PursuitConfig>) {
    commands.insert_resource(ReplanTimer(Timer::new(
        config.replan_interval(),
        TimerMode::Repeating,
    )));
}

fn remove_replan_timer(mut commands: Commands) {
    commands.remove_resource::<ReplanTimer>();
}

/// Refresh every agent's `GridCell` from its pixel position.
#[span_fn]
fn track_cells(config: Res<PursuitConfig>, mut query: Query<(&PixelPosition, &mut GridCell)>) {
    let cell_size = config.cell_size as i32;
    for (position, mut cell) in &mut query {
        let current = pixel_to_cell(position.0, cell_size);
        if cell.0 != current {
            cell.0 = current;
        }
    }
}

/// When the replan timer fires, ask every pursuer to plan toward the
/// player's cell. Other enemies' cells are the threats.
#[allow(clippy::too_many_arguments)]
fn replan_pursuers(
    time: Res<Time>,
    mut timer: ResMut<ReplanTimer>,
    level: Res<LevelMap>,
    config: Res<PursuitConfig>,
    mut stats: ResMut<GameStats>,
    player: Query<&GridCell, With<Player>>,
    mut enemies: Query<(Entity, &mut Pursuer), With<Enemy>>,
) {
    timer.tick(time.delta());
    if !timer.just_finished() {
        return;
    }
    span_scope!("replan_pursuers");

    let Ok(target) = player.single() else {
        return;
    };
    let target = target.0;
    if !level.grid.contains(target) {
        return;
    }

    let occupied: Vec<(Entity, Cell)> = enemies
        .iter()
        .map(|(entity, pursuer)| (entity, pursuer.cell()))
        .collect();
    let mut threats = Vec::with_capacity(occupied.len());

    for (entity, mut pursuer) in &mut enemies {
        let own = pursuer.cell();
        if !level.grid.contains(own) {
            warn!("pursuer {entity:?} left the grid at {own}");
            continue;
        }

        threats.clear();
        if config.avoid_other_agents {
            threats.extend(
                occupied
                    .iter()
                    .filter(|&&(other, cell)| other != entity && cell != own)
                    .map(|&(_, cell)| cell),
            );
        }

        match pursuer.request_replan(&level.grid, own, target, &threats) {
            ReplanOutcome::Suppressed => {}
            ReplanOutcome::Installed(_) => stats.routes_installed += 1,
            ReplanOutcome::NoRoute => stats.routes_missing += 1,
        }
    }
}

/// Step every pursuer along its route.
#[span_fn]
fn advance_pursuers(
    time: Res<Time>,
    config: Res<PursuitConfig>,
    mut query: Query<(&mut Pursuer, &mut PixelPosition, &mut GridCell), With<Enemy>>,
) {
    let delta_time = time.delta_secs() * config.frame_rate_scale;
    for (mut pursuer, mut position, mut cell) in &mut query {
        pursuer.advance(delta_time);
        position.0 = pursuer.position();
        cell.0 = pursuer.cell();
    }
}

/// Any enemy sharing the player's cell catches the player.
fn enemy_player_collision(
    mut commands: Commands,
    player: Query<&GridCell, With<Player>>,
    enemies: Query<(Entity, &GridCell), With<Enemy>>,
    mut lives: ResMut<Lives>,
    mut next_state: ResMut<NextState<PlayingState>>,
) {
    let Ok(player_cell) = player.single() else {
        return;
    };
    for (enemy, cell) in &enemies {
        if cell == player_cell {
            lives.0 = lives.0.saturating_sub(1);
            commands.trigger(PlayerCaught {
                enemy,
                cell: cell.0,
            });
            next_state.set(PlayingState::PlayerDeath);
            return;
        }
    }
}

fn on_player_caught(trigger: On<PlayerCaught>, mut stats: ResMut<GameStats>, lives: Res<Lives>) {
    let caught = trigger.event();
    stats.deaths += 1;
    info!(
        "player caught at {} by {:?}, {} lives left",
        caught.cell, caught.enemy, lives.0
    );
}

/// Reset everyone to their spawn cell, or end the game when no lives remain.
#[allow(clippy::type_complexity, clippy::too_many_arguments)]
fn handle_player_death(
    mut player_query: Query<
        (&SpawnCell, &mut PixelPosition, &mut GridCell, &mut SubPixel),
        (With<Player>, Without<Enemy>),
    >,
    mut enemy_query: Query<
        (&SpawnCell, &mut Pursuer, &mut PixelPosition, &mut GridCell),
        (With<Enemy>, Without<Player>),
    >,
    config: Res<PursuitConfig>,
    lives: Res<Lives>,
    mut timer: ResMut<ReplanTimer>,
    mut next_playing: ResMut<NextState<PlayingState>>,
    mut next_app: ResMut<NextState<AppState>>,
) {
    if lives.0 == 0 {
        next_app.set(AppState::GameOver);
        return;
    }

    let cell_size = config.cell_size as i32;
    if let Ok((spawn, mut position, mut cell, mut sub_pixel)) = player_query.single_mut() {
        position.0 = cell_to_pixel(spawn.0, cell_size);
        cell.0 = spawn.0;
        sub_pixel.0 = Vec2::ZERO;
    }

    for (spawn, mut pursuer, mut position, mut cell) in &mut enemy_query {
        pursuer.0 = new_controller(&config, spawn.0);
        position.0 = pursuer.position();
        cell.0 = spawn.0;
    }

    timer.reset();
    next_playing.set(PlayingState::Playing);
}

/// Place sprites from pixel positions and flip enemies to their facing.
#[allow(clippy::type_complexity)]
fn sync_transforms(
    level: Option<Res<LevelMap>>,
    config: Res<PursuitConfig>,
    mut query: Query<
        (&PixelPosition, &mut Transform, Option<&Pursuer>, Option<&mut Sprite>),
        Changed<PixelPosition>,
    >,
) {
    let Some(level) = level else { return };
    for (position, mut transform, pursuer, sprite) in &mut query {
        let world = level.pixel_to_world(position.0, config.cell_size);
        transform.translation.x = world.x;
        transform.translation.y = world.y;

        if let (Some(pursuer), Some(mut sprite)) = (pursuer, sprite) {
            sprite.flip_x = pursuer.facing() == Facing::Left;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
