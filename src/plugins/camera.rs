use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use super::level::LevelMap;
use super::telemetry::GameSet;
use crate::settings::PursuitConfig;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, |mut commands: Commands| {
            commands.spawn(Camera2d);
        });
        app.add_systems(Update, frame_level.in_set(GameSet::Presentation));
    }
}

/// Orthographic scale that shows `level_px` plus a one-cell border inside
/// `window_px`.
pub fn fit_scale(level_px: Vec2, cell_px: f32, window_px: Vec2) -> f32 {
    if window_px.x <= 0.0 || window_px.y <= 0.0 {
        return 1.0;
    }
    let wanted = level_px + Vec2::splat(2.0 * cell_px);
    (wanted / window_px).max_element()
}

#[span_fn]
fn frame_level(
    level: Option<Res<LevelMap>>,
    config: Res<PursuitConfig>,
    windows: Query<&Window>,
    mut cameras: Query<&mut Projection, With<Camera2d>>,
) {
    let (Some(level), Ok(window), Ok(mut projection)) =
        (level, windows.single(), cameras.single_mut())
    else {
        return;
    };

    let cell = config.cell_size as f32;
    let level_px = Vec2::new(level.width() as f32, level.height() as f32) * cell;
    let scale = fit_scale(level_px, cell, Vec2::new(window.width(), window.height()));

    if let Projection::Orthographic(ortho) = projection.as_mut() {
        ortho.scale = scale;
    }
}
