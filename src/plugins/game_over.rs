//! End-of-run summary. Enter (or Space) starts a fresh run on the same level.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::app_state::AppState;
use crate::resources::GameStats;

pub struct GameOverPlugin;

impl Plugin for GameOverPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::GameOver), show_summary);
        app.add_systems(OnExit(AppState::GameOver), hide_summary);
        app.add_systems(Update, restart_on_key.run_if(in_state(AppState::GameOver)));
    }
}

#[derive(Component)]
pub struct SummaryScreen;

const TITLE_COLOR: Color = Color::srgb(0.9, 0.25, 0.2);
const HINT_COLOR: Color = Color::srgb(0.6, 0.6, 0.65);

/// Text shown under the title, one entry per line.
pub fn summary_lines(stats: &GameStats) -> Vec<String> {
    let mut lines = vec![match stats.deaths {
        1 => "Caught once".to_string(),
        n => format!("Caught {n} times"),
    }];
    lines.push(format!("Routes planned: {}", stats.routes_installed));
    if stats.routes_missing > 0 {
        lines.push(format!("Searches without a route: {}", stats.routes_missing));
    }
    lines
}

fn label(text: impl Into<String>, size: f32, color: Color) -> impl Bundle {
    (
        Text::new(text),
        TextColor(color),
        TextFont {
            font_size: size,
            ..default()
        },
    )
}

fn show_summary(mut commands: Commands, stats: Res<GameStats>) {
    info!(
        "run over: {} deaths, {} routes, {} failed searches",
        stats.deaths, stats.routes_installed, stats.routes_missing
    );

    let lines = summary_lines(&stats);
    commands
        .spawn((
            SummaryScreen,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(12.0),
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.85)),
        ))
        .with_children(|screen| {
            screen.spawn(label("Game Over", 40.0, TITLE_COLOR));
            for line in lines {
                screen.spawn(label(line, 20.0, Color::WHITE));
            }
            screen.spawn(label("Enter to try again", 16.0, HINT_COLOR));
        });
}

fn hide_summary(mut commands: Commands, screens: Query<Entity, With<SummaryScreen>>) {
    for screen in &screens {
        commands.entity(screen).despawn();
    }
}

fn restart_on_key(keys: Res<ButtonInput<KeyCode>>, mut next_state: ResMut<NextState<AppState>>) {
    if keys.any_just_pressed([KeyCode::Enter, KeyCode::Space]) {
        next_state.set(AppState::InGame);
    }
}
