pub mod ai;
pub mod app_state;
pub mod components;
pub mod events;
pub mod plugins;
pub mod resources;
pub mod settings;

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use app_state::{AppState, PlayingState};
use plugins::camera::CameraPlugin;
use plugins::debug_overlay::DebugOverlayPlugin;
use plugins::game_over::GameOverPlugin;
use plugins::level::LevelPlugin;
use plugins::player::PlayerPlugin;
use plugins::pursuit::PursuitPlugin;
use plugins::telemetry::TelemetryPlugin;
use resources::{GameStats, Lives};
use settings::{PlayerConfig, PursuitConfig};

/// Game rules without anything that needs a window: states, level, player,
/// pursuit, game over and telemetry. Runs headless under `MinimalPlugins`.
pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        // State machine (StatesPlugin comes from DefaultPlugins)
        app.init_state::<AppState>();
        app.add_sub_state::<PlayingState>();

        // Settings fall back to defaults unless inserted beforehand
        app.init_resource::<PursuitConfig>();
        app.init_resource::<PlayerConfig>();

        app.add_plugins(TelemetryPlugin);
        app.add_plugins(LevelPlugin);
        app.add_plugins(PlayerPlugin);
        app.add_plugins(PursuitPlugin);
        app.add_plugins(GameOverPlugin);

        // Per-run resources: inserted fresh on each entry into InGame and
        // kept through GameOver for the summary.
        app.add_systems(OnEnter(AppState::InGame), init_game_session);
    }
}

/// Everything: gameplay plus camera and the route overlay.
pub struct CavernPlugin;

impl Plugin for CavernPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(GameplayPlugin);
        app.add_plugins(CameraPlugin);
        app.add_plugins(DebugOverlayPlugin);
    }
}

/// Insert per-run resources with fresh defaults.
#[span_fn]
fn init_game_session(mut commands: Commands, player: Res<PlayerConfig>) {
    commands.insert_resource(Lives(player.lives));
    commands.insert_resource(GameStats::default());
}
