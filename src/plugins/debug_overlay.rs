//! Route overlay: draws each pursuer's remaining route with gizmos.
//!
//! Lines join the pursuer to its route cells in order; nodes outline every
//! cell still to visit. Both are toggled from the debug settings.

use bevy::prelude::*;

use super::level::{LevelMap, cell_to_pixel};
use super::telemetry::GameSet;
use crate::components::Pursuer;
use crate::settings::{DebugConfig, PursuitConfig};

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugConfig>();
        app.add_systems(
            Update,
            draw_routes
                .in_set(GameSet::Presentation)
                .run_if(|debug: Res<DebugConfig>| debug.any()),
        );
    }
}

const ROUTE_LINE_COLOR: Color = Color::srgb(1.0, 0.4, 0.3);
const ROUTE_NODE_COLOR: Color = Color::srgba(1.0, 0.8, 0.2, 0.6);

fn draw_routes(
    mut gizmos: Gizmos,
    debug: Res<DebugConfig>,
    level: Option<Res<LevelMap>>,
    config: Res<PursuitConfig>,
    pursuers: Query<&Pursuer>,
) {
    let Some(level) = level else { return };
    let cell_size = config.cell_size;
    let node_size = Vec2::splat(cell_size as f32 - 2.0);

    for pursuer in &pursuers {
        let mut previous = level.pixel_to_world(pursuer.position(), cell_size);
        for &cell in pursuer.route() {
            let point = level.pixel_to_world(cell_to_pixel(cell, cell_size as i32), cell_size);
            if debug.draw_route_lines {
                gizmos.line_2d(previous, point, ROUTE_LINE_COLOR);
            }
            if debug.draw_route_nodes {
                gizmos.rect_2d(point, node_size, ROUTE_NODE_COLOR);
            }
            previous = point;
        }
    }
}
