//! Frame-level telemetry and the per-frame system ordering.

use bevy::prelude::*;
use micromegas_tracing::prelude::{fmetric, span_scope};

/// Per-frame ordering of gameplay systems in `Update`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    /// Player input and movement.
    Input,
    /// Cell tracking, replanning, enemy movement and collisions.
    Pursuit,
    /// Transforms, sprites and overlays.
    Presentation,
}

pub struct TelemetryPlugin;

impl Plugin for TelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (GameSet::Input, GameSet::Pursuit, GameSet::Presentation).chain(),
        );
        app.add_systems(Last, frame_telemetry);
    }
}

fn frame_telemetry(time: Res<Time>) {
    span_scope!("frame");
    let dt_ms = time.delta_secs_f64() * 1000.0;
    fmetric!("frame_time_ms", "ms", dt_ms);
}
