//! Tunables loaded from the JSON settings file.
//!
//! The file nests everything under `game_configurations`:
//!
//! ```json
//! {
//!   "game_configurations": {
//!     "config": {
//!       "enemy_settings": { "enemy_speed": 2.0, "replan_interval_ms": 100 },
//!       "player_settings": { "walk_speed": 3.0, "lives": 3 }
//!     },
//!     "settings": {
//!       "debug_settings": { "draw_enemy_line_path": true }
//!     }
//!   }
//! }
//! ```
//!
//! Every section and key is optional; missing ones take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Pursuit
// ---------------------------------------------------------------------------

/// Enemy pursuit tuning.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursuitConfig {
    /// Pixels per reference frame.
    #[serde(alias = "enemy_speed")]
    pub agent_speed: f32,
    pub replan_interval_ms: u64,
    /// Cells (Manhattan) within which another agent repels a route.
    pub danger_radius: u32,
    /// Pixels per grid cell, identical on both axes.
    pub cell_size: u32,
    /// Pass the other enemies' cells to the planner as threats.
    pub avoid_other_agents: bool,
    /// Multiplier turning frame delta seconds into the movement delta-time.
    /// At 60 a 60 fps frame advances by exactly one reference frame.
    pub frame_rate_scale: f32,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            agent_speed: 2.0,
            replan_interval_ms: 100,
            danger_radius: crate::ai::pathfinder::DEFAULT_DANGER_RADIUS,
            cell_size: 30,
            avoid_other_agents: true,
            frame_rate_scale: 60.0,
        }
    }
}

impl PursuitConfig {
    pub fn replan_interval(&self) -> Duration {
        Duration::from_millis(self.replan_interval_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.agent_speed.is_finite() || self.agent_speed <= 0.0 {
            return Err(SettingsError::Invalid {
                field: "agent_speed",
                reason: format!("must be a positive number, got {}", self.agent_speed),
            });
        }
        if self.replan_interval_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "replan_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cell_size == 0 {
            return Err(SettingsError::Invalid {
                field: "cell_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.frame_rate_scale.is_finite() || self.frame_rate_scale <= 0.0 {
            return Err(SettingsError::Invalid {
                field: "frame_rate_scale",
                reason: format!("must be a positive number, got {}", self.frame_rate_scale),
            });
        }
        Ok(())
    }

    /// Read, parse and validate the pursuit section of a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Ok(Settings::load(path)?.pursuit)
    }

    /// Parse and validate the pursuit section of a settings document.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(Settings::from_json_str(json)?.pursuit)
    }
}

// ---------------------------------------------------------------------------
// Player and debug
// ---------------------------------------------------------------------------

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Pixels per reference frame.
    pub walk_speed: f32,
    pub lives: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            lives: 3,
        }
    }
}

/// Route overlay toggles.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    #[serde(alias = "draw_enemy_line_path")]
    pub draw_route_lines: bool,
    #[serde(alias = "draw_enemy_block_path")]
    pub draw_route_nodes: bool,
}

impl DebugConfig {
    pub fn any(&self) -> bool {
        self.draw_route_lines || self.draw_route_nodes
    }
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    game_configurations: GameConfigurations,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GameConfigurations {
    config: ConfigSection,
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigSection {
    enemy_settings: PursuitConfig,
    player_settings: PlayerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsSection {
    debug_settings: DebugConfig,
}

/// Everything the game reads from the settings file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub pursuit: PursuitConfig,
    pub player: PlayerConfig,
    pub debug: DebugConfig,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let file: SettingsFile = serde_json::from_str(json)?;
        let GameConfigurations { config, settings } = file.game_configurations;
        let loaded = Self {
            pursuit: config.enemy_settings,
            player: config.player_settings,
            debug: settings.debug_settings,
        };
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.pursuit.validate()?;
        if !self.player.walk_speed.is_finite() || self.player.walk_speed < 0.0 {
            return Err(SettingsError::Invalid {
                field: "walk_speed",
                reason: format!("must be a non-negative number, got {}", self.player.walk_speed),
            });
        }
        Ok(())
    }

    /// Insert the loaded sections as resources.
    pub fn insert_into(self, app: &mut App) {
        app.insert_resource(self.pursuit);
        app.insert_resource(self.player);
        app.insert_resource(self.debug);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
